//! Error types for permission resolution and rule storage

use thiserror::Error;

/// Errors raised by the permission manager and its storage backends
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The origin could not be normalized into a storable pattern
    #[error("invalid permission origin: '{0}'")]
    InvalidOrigin(String),

    /// The tool name is empty
    #[error("invalid tool name: '{0}'")]
    InvalidToolName(String),

    /// A storage backend failed to read or write
    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Result alias used throughout the crate
pub type PermissionResult<T> = Result<T, PermissionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_origin_message() {
        let err = PermissionError::InvalidOrigin("chrome://extensions".to_string());
        assert_eq!(
            err.to_string(),
            "invalid permission origin: 'chrome://extensions'"
        );
    }

    #[test]
    fn test_serialization_error_is_transparent() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let expected = source.to_string();
        let err = PermissionError::from(source);
        assert_eq!(err.to_string(), expected);
    }
}
