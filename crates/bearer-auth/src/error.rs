//! Error types for credential storage and refresh

/// Errors from credential storage and token refresh.
///
/// Only `RefreshTransport` is recovered inside the lifecycle manager (the
/// stale record is returned instead). Every other variant reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Stored bytes could not be parsed into a credential record.
    #[error("credential storage corrupt: {0}")]
    StorageCorrupt(String),

    /// Storage key could not be read or written.
    #[error("credential storage I/O error: {0}")]
    StorageIo(String),

    /// Token endpoint answered 200 but the body is missing or malformed fields.
    #[error("refresh protocol error: {0}")]
    RefreshProtocol(String),

    /// Network failure, timeout, or non-200 status from the token endpoint.
    #[error("refresh transport error: {0}")]
    RefreshTransport(String),

    #[error("invalid header value: {0}")]
    InvalidHeader(String),
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_identifies_the_failure_class() {
        assert_eq!(
            Error::StorageCorrupt("parsing credential.json: EOF".into()).to_string(),
            "credential storage corrupt: parsing credential.json: EOF"
        );
        assert!(
            Error::RefreshTransport("refresh endpoint returned 500".into())
                .to_string()
                .starts_with("refresh transport error:")
        );
        assert!(
            Error::RefreshProtocol("missing field `useremail`".into())
                .to_string()
                .contains("useremail")
        );
    }
}
