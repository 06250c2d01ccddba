//! Authentication state machine.
//!
//! Each step consumes the caller's input and hands back the next state as a
//! value; nothing is mutated in place. `Unauthenticated` is the starting point,
//! `Authenticated` and `Failed` are terminal:
//!
//! ```text
//! Unauthenticated --refresh token--> Authenticated | Failed
//! Unauthenticated --credentials----> Authenticated | AwaitingSecondFactor | Failed
//! AwaitingSecondFactor --code------> Authenticated | Failed
//! ```

use std::fmt;

use tracing::info;

use super::Session;
use crate::error::AuthError;
use crate::ring::{LoginResponse, RingApi};

/// Outcome of a password login.
#[derive(Debug)]
pub enum Login {
    Authenticated(Session),
    AwaitingSecondFactor(SecondFactorChallenge),
}

/// A pending login waiting for the out-of-band code.
pub struct SecondFactorChallenge {
    username: String,
    password: String,
    hint: String,
}

impl SecondFactorChallenge {
    /// Where the service says it sent the code.
    pub fn hint(&self) -> &str {
        &self.hint
    }
}

impl fmt::Debug for SecondFactorChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondFactorChallenge")
            .field("username", &self.username)
            .field("hint", &self.hint)
            .finish_non_exhaustive()
    }
}

pub struct Authenticator<'a, A: RingApi + ?Sized> {
    api: &'a A,
    hardware_id: &'a str,
}

impl<'a, A: RingApi + ?Sized> Authenticator<'a, A> {
    pub fn new(api: &'a A, hardware_id: &'a str) -> Self {
        Self { api, hardware_id }
    }

    /// One remote call, no retry. A rejected token is not recoverable here.
    pub fn with_refresh_token(&self, refresh_token: &str) -> Result<Session, AuthError> {
        match self
            .api
            .authenticate_by_refresh_token(refresh_token, self.hardware_id)?
        {
            LoginResponse::Granted(grant) => {
                info!("Authenticated with stored refresh token");
                Ok(Session::from_grant(grant))
            }
            LoginResponse::Throttled => Err(AuthError::Throttled),
            LoginResponse::Rejected(reason) => Err(AuthError::Rejected(reason)),
            LoginResponse::SecondFactorRequired(_) => Err(AuthError::Rejected(
                "refresh token requires a second factor".to_string(),
            )),
        }
    }

    pub fn with_credentials(&self, username: &str, password: &str) -> Result<Login, AuthError> {
        match self.api.authenticate(username, password, self.hardware_id)? {
            LoginResponse::Granted(grant) => {
                info!("Authenticated with username and password");
                Ok(Login::Authenticated(Session::from_grant(grant)))
            }
            LoginResponse::SecondFactorRequired(hint) => {
                info!("Second factor required");
                Ok(Login::AwaitingSecondFactor(SecondFactorChallenge {
                    username: username.to_string(),
                    password: password.to_string(),
                    hint,
                }))
            }
            LoginResponse::Throttled => Err(AuthError::Throttled),
            LoginResponse::Rejected(reason) => Err(AuthError::Rejected(reason)),
        }
    }

    /// Exactly one attempt. A rejected code leaves the challenge usable for
    /// another try; throttling is terminal.
    pub fn submit_second_factor(
        &self,
        challenge: &SecondFactorChallenge,
        code: &str,
    ) -> Result<Session, AuthError> {
        let response = self.api.submit_second_factor(
            &challenge.username,
            &challenge.password,
            self.hardware_id,
            code.trim(),
        )?;

        match response {
            LoginResponse::Granted(grant) => {
                info!("Second factor accepted");
                Ok(Session::from_grant(grant))
            }
            LoginResponse::Throttled => Err(AuthError::Throttled),
            LoginResponse::Rejected(reason) => Err(AuthError::SecondFactorRejected(reason)),
            LoginResponse::SecondFactorRequired(_) => Err(AuthError::SecondFactorRejected(
                "code was not accepted".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::fake::{granted, FakeRing};

    #[test]
    fn refresh_token_path_skips_credentials() {
        let api = FakeRing::new().with_refreshes([granted("at", "rt2")]);
        let auth = Authenticator::new(&api, "hw");

        let session = auth.with_refresh_token("rt1").unwrap();
        assert_eq!(session.refresh_token(), Some("rt2"));
        assert_eq!(api.calls("authenticate_by_refresh_token"), 1);
        assert_eq!(api.calls("authenticate"), 0);
    }

    #[test]
    fn rejected_refresh_token_is_not_retried() {
        let api = FakeRing::new().with_refreshes([
            LoginResponse::Rejected("401".into()),
            granted("at", "rt"),
        ]);
        let auth = Authenticator::new(&api, "hw");

        assert!(matches!(
            auth.with_refresh_token("stale"),
            Err(AuthError::Rejected(_))
        ));
        assert_eq!(api.calls("authenticate_by_refresh_token"), 1);
    }

    #[test]
    fn credentials_grant_directly() {
        let api = FakeRing::new().with_logins([granted("at", "rt")]);
        let auth = Authenticator::new(&api, "hw");

        let login = auth.with_credentials("me@example.com", "pw").unwrap();
        assert!(matches!(login, Login::Authenticated(_)));
    }

    #[test]
    fn second_factor_then_valid_code() {
        let api = FakeRing::new()
            .with_logins([LoginResponse::SecondFactorRequired("+1xxxxxx89".into())])
            .with_second_factors([granted("at", "rt")]);
        let auth = Authenticator::new(&api, "hw");

        let challenge = match auth.with_credentials("me@example.com", "pw").unwrap() {
            Login::AwaitingSecondFactor(challenge) => challenge,
            other => panic!("expected a challenge, got {:?}", other),
        };
        assert_eq!(challenge.hint(), "+1xxxxxx89");

        let session = auth.submit_second_factor(&challenge, " 123456\n").unwrap();
        assert_eq!(session.access_token(), "at");
    }

    #[test]
    fn second_factor_then_throttled_is_terminal() {
        let api = FakeRing::new()
            .with_logins([LoginResponse::SecondFactorRequired("sms".into())])
            .with_second_factors([LoginResponse::Throttled]);
        let auth = Authenticator::new(&api, "hw");

        let Login::AwaitingSecondFactor(challenge) =
            auth.with_credentials("me@example.com", "pw").unwrap()
        else {
            panic!("expected a challenge");
        };
        assert!(matches!(
            auth.submit_second_factor(&challenge, "123456"),
            Err(AuthError::Throttled)
        ));
        assert_eq!(api.calls("submit_second_factor"), 1);
    }

    #[test]
    fn throttled_login_fails() {
        let api = FakeRing::new().with_logins([LoginResponse::Throttled]);
        let auth = Authenticator::new(&api, "hw");

        assert!(matches!(
            auth.with_credentials("me@example.com", "pw"),
            Err(AuthError::Throttled)
        ));
    }

    #[test]
    fn transport_failure_fails() {
        // empty script answers with a server error
        let api = FakeRing::new();
        let auth = Authenticator::new(&api, "hw");

        assert!(matches!(
            auth.with_credentials("me@example.com", "pw"),
            Err(AuthError::Remote(_))
        ));
    }

    #[test]
    fn challenge_debug_hides_password() {
        let challenge = SecondFactorChallenge {
            username: "me".into(),
            password: "hunter2".into(),
            hint: "sms".into(),
        };
        assert!(!format!("{:?}", challenge).contains("hunter2"));
    }
}
