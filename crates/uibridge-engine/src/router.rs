use tracing::debug;

use uibridge_proto::{ActionCall, Reply, execute_handler_key};

/// One provider in the capability chain. Returning `None` passes the
/// action to the next, more generic provider.
pub trait CommandSet: Send + Sync {
    fn handle(&self, call: &ActionCall) -> Option<Reply>;
}

/// Mirror of the bridge's dispatch, inside the app process. Providers
/// are consulted most-derived first: OS- or toolkit-specific sets go in
/// front of the generic UI set and shadow it action by action. No match
/// anywhere in the chain replies "not implemented"; this is the terminal
/// node of the routing chain.
pub struct EngineRouter {
    sets: Vec<Box<dyn CommandSet>>,
}

impl EngineRouter {
    pub fn new(sets: Vec<Box<dyn CommandSet>>) -> Self {
        Self { sets }
    }

    pub fn dispatch(&self, call: &ActionCall) -> Reply {
        for set in &self.sets {
            if let Some(reply) = set.handle(call) {
                return reply;
            }
        }

        // A namespaced action may be implemented under its
        // convention-derived name instead.
        if let Some(key) = execute_handler_key(&call.action) {
            let renamed = ActionCall::new(&key, call.params.clone());
            for set in &self.sets {
                if let Some(reply) = set.handle(&renamed) {
                    return reply;
                }
            }
        }

        debug!("no provider for action '{}'", call.action);
        Reply::not_implemented()
    }
}
