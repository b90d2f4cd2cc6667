/// Errors that can occur in bridge transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The bridge address could not be resolved.
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to connect to the bridge.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// The underlying I/O error, whatever stage produced it.
    pub fn io_error(&self) -> &std::io::Error {
        match self {
            TransportError::Resolve { source, .. } | TransportError::Connect { source, .. } => {
                source
            }
            TransportError::Io(err) => err,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
