/// Failures reported back to whoever issued a command.
///
/// Unsupported urls are not represented here, they simply mean "nothing is tracked".
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
    #[error("browser api failure: {0:#}")]
    Platform(anyhow::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;
