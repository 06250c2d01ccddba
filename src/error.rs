use thiserror::Error;

/// Failure of a single call to the Ring service.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }
}

/// Terminal authentication failures. None of these are retried within a run.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no credentials available: pass --username and --password, or run once with them to store a refresh token")]
    MissingCredentials,

    #[error("authentication rejected: {0}")]
    Rejected(String),

    #[error("two factor authentication is required, but too many codes have been requested recently. Wait a few minutes and try again")]
    Throttled,

    #[error("two factor code rejected: {0}")]
    SecondFactorRejected(String),

    #[error("connection failed, validate your credentials: {0}")]
    Remote(#[from] RemoteError),
}

/// Why a downloaded payload was not accepted as an image.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("image data is corrupt: {0}")]
    Corrupt(String),

    #[error("image format not recognized: {0}")]
    UnrecognizedFormat(String),
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("snapshot could not be retrieved after {attempts}/{max_attempts} attempts")]
    Exhausted { attempts: u32, max_attempts: u32 },
}
