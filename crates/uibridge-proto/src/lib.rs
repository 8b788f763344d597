#![deny(clippy::all)]

mod client;
mod endpoint;
mod error;
mod frame;
mod message;

// Re-export status codes so protocol users need only this crate.
pub use uibridge_common::{
    STATUS_ERROR, STATUS_NOT_IMPLEMENTED, STATUS_OK, STATUS_TIMEOUT, is_failure, status_name,
};

pub use client::DriverClient;
pub use client::SocketStream;
pub use endpoint::DEFAULT_PORT;
pub use endpoint::Endpoint;
pub use error::ProtoError;
pub use frame::DEFAULT_MAX_FRAME_BYTES;
pub use frame::FrameDecoder;
pub use frame::FrameError;
pub use message::ActionCall;
pub use message::HEADLESS_APP;
pub use message::Message;
pub use message::Reply;
pub use message::app_connect_payload;
pub use message::execute_handler_key;

pub type Result<T> = std::result::Result<T, ProtoError>;
