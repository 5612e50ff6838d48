//! Error types for the recognition engine adapter.

/// Errors raised synchronously from adapter entry points.
///
/// Asynchronous failures (connection drops, service errors) never surface
/// here; they arrive through the site's `error` callback instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    /// The adapter was used before a site was attached.
    #[error("adapter is not initialized: {0}")]
    Uninitialized(&'static str),

    /// `init` was called while a live connection already exists.
    #[error("adapter is already initialized")]
    AlreadyInitialized,

    /// A configuration value is missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The transport layer failed while setting up a connection.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors from the wire layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("network error: {0}")]
    Network(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_converts_to_adapter_error() {
        let err: AdapterError = TransportError::ConnectionClosed.into();
        assert!(matches!(err, AdapterError::Transport(_)));
        assert!(err.to_string().contains("connection closed"));
    }

    #[test]
    fn test_error_messages() {
        let err = AdapterError::InvalidArgument("no authentication parameters".to_string());
        assert!(err.to_string().contains("no authentication parameters"));

        let err = AdapterError::Uninitialized("site not set");
        assert!(err.to_string().contains("site not set"));
    }
}
