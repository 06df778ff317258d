//! Crate-level error type.

use thiserror::Error;

/// Everything that can go wrong between the transcript and the wire.
///
/// Submission errors are handled at the submission boundary (logged, alerted,
/// never retried); the remaining variants surface from start-up.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A send was attempted while the channel was not open.
    #[error("channel is not open")]
    ChannelNotReady,

    /// An inbound frame could not be parsed into a message.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Serializing or handing a frame to the socket failed.
    #[error("send failed: {0}")]
    SendFailure(String),

    /// The WebSocket handshake did not complete.
    #[error("connection to {url} failed: {detail}")]
    Connect { url: String, detail: String },

    /// The configuration file was unreadable or invalid.
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// True for the errors a user can recover from by resubmitting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ChatError::ChannelNotReady | ChatError::MalformedPayload(_) | ChatError::SendFailure(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_channel_not_ready() {
        assert_eq!(ChatError::ChannelNotReady.to_string(), "channel is not open");
    }

    #[test]
    fn test_display_connect_includes_url() {
        let err = ChatError::Connect {
            url: "ws://127.0.0.1:8000/test_1/ws/1".to_string(),
            detail: "refused".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("ws://127.0.0.1:8000/test_1/ws/1"));
        assert!(s.contains("refused"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ChatError = io.into();
        assert!(matches!(err, ChatError::Io(_)));
    }

    #[test]
    fn test_recoverable_variants() {
        assert!(ChatError::ChannelNotReady.is_recoverable());
        assert!(ChatError::MalformedPayload("x".into()).is_recoverable());
        assert!(ChatError::SendFailure("x".into()).is_recoverable());
        assert!(!ChatError::Config("x".into()).is_recoverable());
    }
}
