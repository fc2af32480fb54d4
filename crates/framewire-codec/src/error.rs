use framewire_transport::TransportError;

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was transferred.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// A byte buffer or encoded payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A length prefix on the wire was negative.
    #[error("negative length prefix ({0})")]
    NegativeLength(i32),

    /// A length-prefixed string was not valid UTF-8.
    #[error("invalid utf-8 in string field: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A message rejected its own decoded contents.
    #[error("invalid message data: {0}")]
    InvalidData(String),
}

impl FrameError {
    /// True when the error means the underlying stream is unusable.
    ///
    /// Everything else is a data fault confined to a single frame.
    pub fn is_transport(&self) -> bool {
        matches!(self, FrameError::Io(_) | FrameError::ConnectionClosed)
    }
}

impl From<TransportError> for FrameError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
            TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
                FrameError::Io(source)
            }
            other => FrameError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Errors raised by message type registration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The type id is already bound to another message type.
    #[error("type id {type_id} already registered to {existing}")]
    DuplicateType {
        type_id: i32,
        existing: &'static str,
    },

    /// The message type is already registered under a different id.
    #[error("{type_name} already registered under type id {existing_id}")]
    DuplicateFactory {
        type_name: &'static str,
        existing_id: i32,
    },

    /// The same type id or message type appears twice in one batch.
    #[error("batch registers type id {type_id} ({type_name}) more than once")]
    DuplicateInBatch {
        type_id: i32,
        type_name: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classification() {
        assert!(FrameError::ConnectionClosed.is_transport());
        assert!(FrameError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe)).is_transport());
        assert!(!FrameError::NegativeLength(-1).is_transport());
        assert!(!FrameError::InvalidData("bad".to_string()).is_transport());
    }

    #[test]
    fn converts_transport_errors_to_io() {
        let err: FrameError = TransportError::Resolve {
            host: "nowhere.invalid".to_string(),
            port: 7,
        }
        .into();
        assert!(matches!(err, FrameError::Io(_)));
    }
}
