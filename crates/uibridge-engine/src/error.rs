use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Proto(#[from] uibridge_proto::ProtoError),

    #[error(transparent)]
    Frame(#[from] uibridge_proto::FrameError),
}
