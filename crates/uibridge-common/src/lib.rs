#![deny(clippy::all)]

mod status;
mod sync;

pub use status::STATUS_ERROR;
pub use status::STATUS_NOT_IMPLEMENTED;
pub use status::STATUS_OK;
pub use status::STATUS_TIMEOUT;
pub use status::is_failure;
pub use status::status_name;
pub use sync::mutex_lock_or_recover;
