use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Content not found: {0}")]
    NotFound(String),

    /// The remote answered, but its payload could not be turned into stream
    /// metadata. Retrying the same URL will not help.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns `true` for failures that may succeed when attempted again later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Network(_) | BridgeError::NotAvailable(_) | BridgeError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(BridgeError::Network("reset".into()).is_retryable());
        assert!(BridgeError::NotAvailable("resolver".into()).is_retryable());
        assert!(!BridgeError::Extraction("bad json".into()).is_retryable());
        assert!(!BridgeError::NotFound("gone".into()).is_retryable());
    }
}
