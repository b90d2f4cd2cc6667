use busbridge_frame::FrameError;
use busbridge_transport::TransportError;

/// Why a connection is (or became) unusable.
#[derive(Debug, thiserror::Error)]
pub enum DisconnectCause {
    /// No socket is open.
    #[error("not connected")]
    NotConnected,

    /// The bridge closed the socket on a frame boundary.
    #[error("connection closed by bridge")]
    ClosedByBridge,

    /// Opening the socket failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Reading or writing a frame failed.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Errors that can occur in bridge client operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The connection is closed or could not be opened.
    #[error("disconnected: {0}")]
    Disconnected(#[source] DisconnectCause),

    /// The bridge reported an error (`{"type":"err"}` frame).
    #[error("bridge error: {0}")]
    ServerError(String),

    /// A body, headers or envelope could not be encoded.
    #[error("invalid data for '{address}': {source}")]
    InvalidData {
        address: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// `connect` was called on a connection that is already open.
    #[error("already connected")]
    AlreadyConnected,

    /// `reply` was called on a message that carries no reply address.
    #[error("message on '{0}' has no reply address")]
    NoReplyAddress(String),

    /// A background thread could not be started.
    #[error("failed to start {what} thread: {source}")]
    Spawn {
        what: &'static str,
        source: std::io::Error,
    },
}

impl BridgeError {
    pub(crate) fn not_connected() -> Self {
        BridgeError::Disconnected(DisconnectCause::NotConnected)
    }

    pub(crate) fn invalid_data(
        address: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        BridgeError::InvalidData {
            address: address.into(),
            source: source.into(),
        }
    }

    /// Whether this error means the connection is gone.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, BridgeError::Disconnected(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn disconnected_exposes_cause_as_source() {
        let err = BridgeError::Disconnected(DisconnectCause::Frame(FrameError::ConnectionClosed));
        assert!(err.is_disconnected());
        assert_eq!(
            err.to_string(),
            "disconnected: connection closed (incomplete frame)"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn invalid_data_names_address() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = BridgeError::invalid_data("math.add", source);
        assert!(err.to_string().starts_with("invalid data for 'math.add'"));
        assert!(!err.is_disconnected());
    }
}
