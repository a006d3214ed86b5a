/// Core error type for the feed service.
///
/// Adapter crates map their specific errors into this type so the scan loop
/// and the HTTP layer can tell retryable failures from caller mistakes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// The bot session is not established (or the token was rejected).
    #[error("telegram session not established: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A single remote call failed (network, flood-wait, protocol).
    #[error("transient error: {0}")]
    Transient(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
