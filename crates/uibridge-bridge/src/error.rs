use thiserror::Error;

/// Bridge lifecycle and I/O errors.
///
/// Routing failures (unknown app, closed connection, timeout) are not
/// errors at this level; they travel back to the driver as status
/// replies.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("failed to launch '{program}': {reason}")]
    Launch { program: String, reason: String },

    #[error("signal handler setup failed: {0}")]
    SignalSetup(String),
}
