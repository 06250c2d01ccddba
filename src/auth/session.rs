use std::fmt;

use crate::ring::Grant;

/// Authenticated handle for one run. Only the refresh token outlives it.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    access_token: String,
    refresh_token: String,
}

impl Session {
    pub fn from_grant(grant: Grant) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// The token to store for the next run, if the service issued one.
    pub fn refresh_token(&self) -> Option<&str> {
        Some(self.refresh_token.as_str()).filter(|t| !t.is_empty())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("rotated", &self.refresh_token().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_refresh_token_is_absent() {
        let session = Session::from_grant(Grant {
            access_token: "at".into(),
            refresh_token: String::new(),
        });
        assert_eq!(session.access_token(), "at");
        assert_eq!(session.refresh_token(), None);
    }
}
