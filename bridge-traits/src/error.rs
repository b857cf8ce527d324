use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("HTTP error {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Player error: {0}")]
    PlayerError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether retrying the same request may succeed: server errors, rate
    /// limiting and connection-level failures.
    pub fn is_transient(&self) -> bool {
        match self {
            BridgeError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            BridgeError::OperationFailed(_) | BridgeError::Io(_) => true,
            BridgeError::NotAvailable(_) | BridgeError::PlayerError(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> BridgeError {
        BridgeError::HttpStatus {
            status,
            url: "https://cdn.example.com/a.mp3".to_string(),
        }
    }

    #[test]
    fn test_transient_errors() {
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(!status(401).is_transient());
        assert!(BridgeError::OperationFailed("Request timed out".into()).is_transient());
        assert!(!BridgeError::NotAvailable("offline".into()).is_transient());
    }
}
