#![deny(clippy::all)]

//! The engine lives inside the application under test: it connects back
//! to the bridge, registers its app name, and serves UI commands the
//! bridge forwards. Dispatch walks an ordered chain of capability
//! providers, most-derived first; the chain's end replies
//! "not implemented" because there is nowhere further to route.

mod client;
mod commands;
mod driver;
mod error;
mod router;

pub use client::EngineClient;
pub use commands::UiCommandSet;
pub use driver::{DriverError, UiDriver};
pub use error::EngineError;
pub use router::{CommandSet, EngineRouter};
