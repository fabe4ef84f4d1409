use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("malformed transaction: {0}")]
    Decode(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("transaction rejected by backend: {0}")]
    Rejected(String),

    #[error("connection pool exhausted for {0}")]
    PoolExhausted(String),

    #[error("connection pool closed for {0}")]
    PoolClosed(String),

    #[error("no backend endpoints configured")]
    NoEndpoints,

    #[error("dispatch queue is full")]
    QueueFull,

    #[error("dispatch pipeline is closed")]
    PipelineClosed,

    #[error("signing error: {0}")]
    Signing(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Failures expected from a live backend under load.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport(_)
                | GatewayError::Rejected(_)
                | GatewayError::PoolExhausted(_)
                | GatewayError::NoEndpoints
                | GatewayError::Io(_)
        )
    }
}

impl From<bincode::Error> for GatewayError {
    fn from(err: bincode::Error) -> Self {
        GatewayError::Decode(err.to_string())
    }
}

impl From<hex::FromHexError> for GatewayError {
    fn from(err: hex::FromHexError) -> Self {
        GatewayError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_failures_are_retryable() {
        assert!(GatewayError::Transport("reset".into()).is_retryable());
        assert!(GatewayError::Rejected("ErrTxExist".into()).is_retryable());
        assert!(GatewayError::PoolExhausted("127.0.0.1:8802".into()).is_retryable());
    }

    #[test]
    fn caller_failures_are_not_retryable() {
        assert!(!GatewayError::Decode("odd length".into()).is_retryable());
        assert!(!GatewayError::PipelineClosed.is_retryable());
        assert!(!GatewayError::QueueFull.is_retryable());
    }
}
