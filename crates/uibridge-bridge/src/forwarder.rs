use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use uibridge_proto::HEADLESS_APP;

use crate::connection::{ForwardBusy, ReplyWait};
use crate::registry::AppRegistry;

/// Sends a command to an app's connection and synchronously awaits its
/// reply, with a restartable silence window and cancellation on
/// disconnect. One forward per app connection at a time; a second
/// caller gets [`ForwardOutcome::Busy`] instead of racing for reply
/// bytes.
pub struct RequestForwarder {
    registry: Arc<AppRegistry>,
    silence_window: Duration,
}

#[derive(Debug, PartialEq)]
pub enum ForwardOutcome {
    /// The app's reply, verbatim, as one complete JSON document.
    Reply(Vec<u8>),
    /// No registered, open connection for the app. Nothing was sent.
    Unreachable,
    /// Another forward is already in flight on this app connection.
    Busy,
    /// The silence window lapsed before a complete reply arrived.
    TimedOut,
    /// The app connection closed mid-wait.
    Disconnected,
}

impl RequestForwarder {
    pub fn new(registry: Arc<AppRegistry>, silence_window: Duration) -> Self {
        Self {
            registry,
            silence_window,
        }
    }

    pub fn forward(&self, app_name: &str, payload: &[u8]) -> ForwardOutcome {
        if app_name == HEADLESS_APP {
            // Headless apps have no UI socket by definition.
            return ForwardOutcome::Unreachable;
        }

        let Some(conn) = self.registry.app_connection(app_name) else {
            debug!("forward to unknown app '{}' fails fast", app_name);
            return ForwardOutcome::Unreachable;
        };
        if !conn.is_open() {
            debug!("forward to '{}' fails fast, connection closed", app_name);
            return ForwardOutcome::Unreachable;
        }

        let guard = match conn.begin_forward() {
            Ok(guard) => guard,
            Err(ForwardBusy) => {
                warn!("rejecting pipelined forward to app '{}'", app_name);
                return ForwardOutcome::Busy;
            }
        };

        if conn.send(payload).is_err() {
            return ForwardOutcome::Unreachable;
        }

        match guard.wait(self.silence_window) {
            ReplyWait::Complete(bytes) => ForwardOutcome::Reply(bytes),
            ReplyWait::TimedOut { partial_len } => {
                warn!(
                    "forward to '{}' timed out after {:?} of silence ({} partial bytes discarded)",
                    app_name, self.silence_window, partial_len
                );
                ForwardOutcome::TimedOut
            }
            ReplyWait::Disconnected => {
                debug!("forward to '{}' cancelled, app disconnected", app_name);
                ForwardOutcome::Disconnected
            }
        }
    }
}
