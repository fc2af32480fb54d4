/// Errors that can occur in listener and session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] framewire_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] framewire_codec::FrameError),

    /// The operation is not allowed in the current lifecycle state.
    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    /// The background loop thread could not be spawned.
    #[error("failed to spawn {name} thread: {source}")]
    ThreadSpawn {
        name: String,
        source: std::io::Error,
    },
}

impl SessionError {
    /// True when the error means the underlying stream is unusable.
    pub fn is_transport(&self) -> bool {
        match self {
            SessionError::Transport(_) => true,
            SessionError::Frame(err) => err.is_transport(),
            SessionError::InvalidState { .. } | SessionError::ThreadSpawn { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use framewire_codec::FrameError;

    use super::*;

    #[test]
    fn invalid_state_message() {
        let err = SessionError::InvalidState {
            action: "start",
            state: "closed",
        };
        assert_eq!(err.to_string(), "cannot start while closed");
        assert!(!err.is_transport());
    }

    #[test]
    fn frame_errors_keep_their_classification() {
        assert!(SessionError::from(FrameError::ConnectionClosed).is_transport());
        assert!(!SessionError::from(FrameError::NegativeLength(-1)).is_transport());
    }
}
