//! Error types for garden-client.

use std::sync::Arc;

use thiserror::Error;

/// Main error type for all garden operations.
#[derive(Debug, Error)]
pub enum GardenError {
    /// I/O error while dialing, reading or writing a connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP-level transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// The request could not be built (unknown route, missing path param, bad URI).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// JSON encode/decode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed or unexpected data where a well-formed frame was required.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The control channel closed before a terminal frame arrived.
    #[error("disconnected")]
    Disconnected,

    /// The server answered 503. The message is the response body, verbatim.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Any other non-success status.
    #[error("{message}")]
    Operation {
        /// HTTP status code returned by the server.
        status: u16,
        /// Response body text.
        message: String,
    },

    /// The server reported a process error on the control channel.
    #[error("process error: {0}")]
    ProcessFailed(String),

    /// A stdout/stderr side channel could not be opened.
    #[error("failed to hijack stream {stream}: {source}")]
    StreamHijack {
        /// Route name of the side channel.
        stream: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<GardenError>,
    },

    /// No container with the given handle exists.
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// Abnormal process termination, shared by every waiter of a process.
    #[error("{0}")]
    Exited(#[source] Arc<GardenError>),
}

impl GardenError {
    /// Returns true for network-layer failures (dial, read, write, malformed request).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            GardenError::Io(_) | GardenError::Http(_) | GardenError::InvalidRequest(_)
        )
    }

    /// Returns true if the server reported itself unavailable.
    pub fn is_service_unavailable(&self) -> bool {
        match self {
            GardenError::ServiceUnavailable(_) => true,
            GardenError::Exited(inner) => inner.is_service_unavailable(),
            _ => false,
        }
    }

    /// HTTP status code carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GardenError::ServiceUnavailable(_) => Some(503),
            GardenError::Operation { status, .. } => Some(*status),
            GardenError::Exited(inner) => inner.status_code(),
            _ => None,
        }
    }

    /// Map a non-success HTTP status and its body to a typed error.
    pub(crate) fn from_status(status: u16, body: &[u8]) -> Self {
        let message = String::from_utf8_lossy(body).into_owned();
        if status == 503 {
            GardenError::ServiceUnavailable(message)
        } else {
            GardenError::Operation { status, message }
        }
    }
}

/// Result type alias using GardenError.
pub type Result<T> = std::result::Result<T, GardenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GardenError>();
    }

    #[test]
    fn test_service_unavailable_message_is_verbatim() {
        let err = GardenError::from_status(503, b"container busy");
        assert!(err.is_service_unavailable());
        assert_eq!(err.to_string(), "container busy");
        assert_eq!(err.status_code(), Some(503));
    }

    #[test]
    fn test_operation_error_carries_status() {
        let err = GardenError::from_status(500, b"boom");
        match &err {
            GardenError::Operation { status, message } => {
                assert_eq!(*status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), "boom");
        assert!(!err.is_transport());
    }

    #[test]
    fn test_transport_classification() {
        let io = GardenError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(io.is_transport());
        assert!(GardenError::InvalidRequest("bad".into()).is_transport());
        assert!(!GardenError::Disconnected.is_transport());
    }

    #[test]
    fn test_exited_delegates_to_inner() {
        let inner = Arc::new(GardenError::from_status(503, b"draining"));
        let err = GardenError::Exited(inner);
        assert!(err.is_service_unavailable());
        assert_eq!(err.to_string(), "draining");
    }

    #[test]
    fn test_stream_hijack_display() {
        let err = GardenError::StreamHijack {
            stream: "Stdout",
            source: Box::new(GardenError::from_status(500, b"nope")),
        };
        assert_eq!(err.to_string(), "failed to hijack stream Stdout: nope");
    }
}
