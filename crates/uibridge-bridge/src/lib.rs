#![deny(clippy::all)]

//! The bridge process: accepts driver and application connections on one
//! endpoint, frames their byte streams into JSON commands, routes each
//! command to a local handler or forwards it to the application it
//! addresses, and correlates forwarded requests with their replies.

pub mod config;
pub mod connection;
pub mod error;
pub mod forwarder;
pub mod handlers;
pub mod platform;
pub mod registry;
pub mod router;
pub mod server;
pub mod telemetry;
pub mod transport;

pub use config::BridgeConfig;
pub use connection::Connection;
pub use error::BridgeError;
pub use forwarder::{ForwardOutcome, RequestForwarder};
pub use platform::{AppLauncher, ProcessLauncher};
pub use registry::AppRegistry;
pub use router::{BridgeContext, CommandRouter, CommandSet, HandlerTable};
pub use server::{BridgeServer, start_bridge};
