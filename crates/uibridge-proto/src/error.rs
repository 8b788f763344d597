use thiserror::Error;

use crate::frame::FrameError;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("I/O error: {0}")]
    Io(std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid endpoint '{0}' (expected 'unix:<path>', 'tcp:<addr:port>' or '<addr:port>')")]
    InvalidEndpoint(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timed out waiting for reply")]
    Timeout,

    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl From<std::io::Error> for ProtoError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => Self::Timeout,
            std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::BrokenPipe => {
                Self::ConnectionClosed
            }
            _ => Self::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_kinds_map_to_timeout() {
        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "t");
        assert!(matches!(ProtoError::from(timed_out), ProtoError::Timeout));

        let would_block = std::io::Error::new(std::io::ErrorKind::WouldBlock, "w");
        assert!(matches!(ProtoError::from(would_block), ProtoError::Timeout));
    }

    #[test]
    fn test_eof_maps_to_connection_closed() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(
            ProtoError::from(eof),
            ProtoError::ConnectionClosed
        ));
    }

    #[test]
    fn test_other_io_errors_pass_through() {
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert!(matches!(ProtoError::from(denied), ProtoError::Io(_)));
    }
}
