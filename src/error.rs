use thiserror::Error;

#[derive(Error, Debug)]
pub enum BasalError {
    /// Caller supplied an out-of-domain parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A precondition on the pipeline was violated; calls must be re-sequenced.
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("malformed input: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for BasalError {
    fn from(err: serde_json::Error) -> Self {
        BasalError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BasalError>;

pub(crate) fn invalid_argument(msg: impl Into<String>) -> BasalError {
    BasalError::InvalidArgument(msg.into())
}
