use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use uibridge_common::STATUS_ERROR;
use uibridge_proto::{ActionCall, Message, Reply, execute_handler_key};

use crate::config::BridgeConfig;
use crate::connection::Connection;
use crate::forwarder::{ForwardOutcome, RequestForwarder};
use crate::platform::AppLauncher;
use crate::registry::AppRegistry;

/// Long-lived state every handler can reach.
pub struct BridgeContext {
    pub registry: Arc<AppRegistry>,
    pub forwarder: RequestForwarder,
    pub launcher: Arc<dyn AppLauncher>,
    pub config: BridgeConfig,
}

pub type Handler = Box<dyn Fn(&BridgeContext, &Arc<Connection>, &ActionCall) + Send + Sync>;

/// Action-name → handler map, built once at startup. Convention-based
/// names (`executeCommand_<ns>_<verb>` for `ns:verb` actions) are plain
/// keys here; there is no runtime reflection.
#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Handler>,
}

impl HandlerTable {
    /// First registration for a name wins: command sets are consulted
    /// most-specific first, so an OS-specific set shadows the generic
    /// one by registering earlier.
    pub fn register<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&BridgeContext, &Arc<Connection>, &ActionCall) + Send + Sync + 'static,
    {
        self.handlers
            .entry(name.to_string())
            .or_insert_with(|| Box::new(handler));
    }

    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }
}

/// A bundle of locally-handled commands. Platform variants provide
/// their own sets; ordering in the router decides precedence.
pub trait CommandSet: Send + Sync {
    fn register(&self, table: &mut HandlerTable);
}

/// Classifies every inbound frame and either handles it locally or
/// forwards it to the app the sending connection declared.
pub struct CommandRouter {
    ctx: Arc<BridgeContext>,
    table: HandlerTable,
}

impl CommandRouter {
    /// Builds the dispatch table from `sets`, most-specific first.
    pub fn new(ctx: Arc<BridgeContext>, sets: &[&dyn CommandSet]) -> Self {
        let mut table = HandlerTable::default();
        for set in sets {
            set.register(&mut table);
        }
        debug!("router ready with {} local handlers", table.names().len());
        Self { ctx, table }
    }

    pub fn context(&self) -> &Arc<BridgeContext> {
        &self.ctx
    }

    /// One fully-decoded frame from `conn`. Classification order: reply,
    /// registration, local action, convention-named action, forward.
    pub fn dispatch(&self, conn: &Arc<Connection>, frame: &[u8]) {
        let value: Value = match serde_json::from_slice(frame) {
            Ok(value) => value,
            Err(err) => {
                // The decoder only emits parseable frames; anything else
                // is a caller bug worth a log line, not a crash.
                warn!("undecodable frame from {}: {}", conn.peer(), err);
                return;
            }
        };

        match Message::classify(&value) {
            Message::Reply(_) => self.ctx.registry.route_reply(conn, frame),
            Message::AppConnect { app_name } => {
                self.ctx.registry.declare_app(conn, &app_name);
            }
            Message::Action(call) => self.dispatch_action(conn, &call, frame),
            Message::Unrecognized => {
                debug!("unrecognized frame from {}", conn.peer());
                conn.send_reply(&Reply::not_implemented());
            }
        }
    }

    fn dispatch_action(&self, conn: &Arc<Connection>, call: &ActionCall, frame: &[u8]) {
        if let Some(handler) = self.table.get(&call.action) {
            handler(&self.ctx, conn, call);
            return;
        }

        if let Some(key) = execute_handler_key(&call.action) {
            if let Some(handler) = self.table.get(&key) {
                handler(&self.ctx, conn, call);
                return;
            }
        }

        self.forward_to_declared_app(conn, call, frame);
    }

    /// No local handler matched: pass the raw payload byte-for-byte to
    /// the app this connection declared. The app's reply, or the
    /// forwarding failure, is the only reply the driver sees.
    fn forward_to_declared_app(&self, conn: &Arc<Connection>, call: &ActionCall, frame: &[u8]) {
        let Some(app_name) = self.ctx.registry.app_name_for(conn) else {
            debug!(
                "action '{}' from {} has no declared app and no local handler",
                call.action,
                conn.peer()
            );
            conn.send_reply(&Reply::error(&format!(
                "no application registered for action '{}'",
                call.action
            )));
            return;
        };

        // A connection cannot serve its own request: its reader thread is
        // the one that would be parked here, so the reply bytes could
        // never be delivered. Fail fast instead of burning the silence
        // window.
        if let Some(target) = self.ctx.registry.app_connection(&app_name) {
            if target.id() == conn.id() {
                debug!(
                    "refusing to forward '{}' back to its own connection",
                    call.action
                );
                conn.send_reply(&Reply::error(&format!(
                    "app '{}' is registered on this connection; '{}' cannot be forwarded to it",
                    app_name, call.action
                )));
                return;
            }
        }

        match self.ctx.forwarder.forward(&app_name, frame) {
            ForwardOutcome::Reply(bytes) => {
                if conn.send(&bytes).is_err() {
                    debug!("driver vanished before reply for '{}'", call.action);
                }
            }
            ForwardOutcome::Unreachable => {
                // Wire-compat shape: empty string value, status 1.
                conn.send_reply(&Reply {
                    status: STATUS_ERROR,
                    value: json!(""),
                });
            }
            ForwardOutcome::Busy => {
                conn.send_reply(&Reply::error(&format!(
                    "a command is already in flight for app '{}'",
                    app_name
                )));
            }
            ForwardOutcome::TimedOut => {
                conn.send_reply(&Reply::timeout(&format!(
                    "app '{}' sent no complete reply within the silence window",
                    app_name
                )));
            }
            ForwardOutcome::Disconnected => {
                conn.send_reply(&Reply::error(&format!(
                    "app '{}' disconnected before replying",
                    app_name
                )));
            }
        }
    }
}
