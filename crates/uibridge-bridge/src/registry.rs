use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info};
use uuid::Uuid;

use uibridge_common::mutex_lock_or_recover;

use crate::connection::Connection;

/// The two-way mapping between connections and application names, plus
/// pending-launch bookkeeping.
///
/// `apps` is the single source of truth for "is this app alive and
/// reachable": only [`declare_app`](Self::declare_app) writes a live
/// entry, only [`forget`](Self::forget) and [`drop_app`](Self::drop_app)
/// clear one. A `Launching` entry means a launch is in progress and no
/// client has attached yet; `wait_for_app` parks on it until the app's
/// own connect-back rendezvouses through `declare_app`.
pub struct AppRegistry {
    state: Mutex<State>,
    attach_cv: Condvar,
}

#[derive(Default)]
struct State {
    conn_apps: HashMap<Uuid, String>,
    conn_paths: HashMap<Uuid, String>,
    apps: HashMap<String, AppEntry>,
}

enum AppEntry {
    Launching,
    Attached(Arc<Connection>),
}

impl Default for AppRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AppRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            attach_cv: Condvar::new(),
        }
    }

    /// Registers `conn` as the handler for `app_name`, replacing any
    /// prior handler, and wakes launch waiters parked on this name.
    pub fn declare_app(&self, conn: &Arc<Connection>, app_name: &str) {
        let mut state = mutex_lock_or_recover(&self.state);
        state.conn_apps.insert(conn.id(), app_name.to_string());
        let prior = state
            .apps
            .insert(app_name.to_string(), AppEntry::Attached(Arc::clone(conn)));
        drop(state);
        self.attach_cv.notify_all();

        match prior {
            Some(AppEntry::Attached(_)) => {
                info!("app '{}' re-registered on {}", app_name, conn.peer())
            }
            Some(AppEntry::Launching) => {
                info!("app '{}' connected back after launch", app_name)
            }
            None => info!("app '{}' registered on {}", app_name, conn.peer()),
        }
    }

    /// Records which app a driver connection addresses, without touching
    /// the live-handler map. The routing key is the short name; the full
    /// path, when one was supplied, is kept for later launches.
    pub fn set_conn_app(&self, conn: &Arc<Connection>, app_name: &str, full_path: Option<&str>) {
        let mut state = mutex_lock_or_recover(&self.state);
        state.conn_apps.insert(conn.id(), app_name.to_string());
        match full_path {
            Some(path) => {
                state.conn_paths.insert(conn.id(), path.to_string());
            }
            None => {
                state.conn_paths.remove(&conn.id());
            }
        }
    }

    pub fn app_name_for(&self, conn: &Connection) -> Option<String> {
        mutex_lock_or_recover(&self.state)
            .conn_apps
            .get(&conn.id())
            .cloned()
    }

    pub fn full_path_for(&self, conn: &Connection) -> Option<String> {
        mutex_lock_or_recover(&self.state)
            .conn_paths
            .get(&conn.id())
            .cloned()
    }

    /// The live connection serving `app_name`, if any.
    pub fn app_connection(&self, app_name: &str) -> Option<Arc<Connection>> {
        match mutex_lock_or_recover(&self.state).apps.get(app_name) {
            Some(AppEntry::Attached(conn)) => Some(Arc::clone(conn)),
            _ => None,
        }
    }

    pub fn registered_apps(&self) -> Vec<String> {
        let mut names: Vec<String> = mutex_lock_or_recover(&self.state)
            .apps
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Marks a launch in progress unless a live handler already exists.
    pub fn mark_launching(&self, app_name: &str) {
        let mut state = mutex_lock_or_recover(&self.state);
        state
            .apps
            .entry(app_name.to_string())
            .or_insert(AppEntry::Launching);
    }

    /// Removes a pending-launch marker. An attached handler is left
    /// alone: the app may have connected back while the caller was
    /// deciding the launch failed.
    pub fn clear_launching(&self, app_name: &str) {
        let mut state = mutex_lock_or_recover(&self.state);
        if matches!(state.apps.get(app_name), Some(AppEntry::Launching)) {
            state.apps.remove(app_name);
        }
    }

    /// Parks until `declare_app` fires for `app_name` or the timeout
    /// lapses. Returns whether the app attached. State is re-read after
    /// every wakeup; nothing observed before the wait is trusted.
    pub fn wait_for_app(&self, app_name: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = mutex_lock_or_recover(&self.state);
        loop {
            if matches!(state.apps.get(app_name), Some(AppEntry::Attached(_))) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let remaining = deadline - now;
            let (guard, _) = self
                .attach_cv
                .wait_timeout(state, remaining)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state = guard;
        }
    }

    /// An unsolicited `{status, value}` frame: no forward was in flight
    /// on this connection. Not an error worth failing on, only noting.
    pub fn route_reply(&self, conn: &Connection, payload: &[u8]) {
        match self.app_name_for(conn) {
            Some(app_name) => debug!(
                "dropping unsolicited reply from app '{}' ({} bytes)",
                app_name,
                payload.len()
            ),
            None => debug!(
                "dropping reply from unregistered connection {} ({} bytes)",
                conn.peer(),
                payload.len()
            ),
        }
    }

    /// Disconnect cleanup: drops the connection's entries and, iff it
    /// was the live handler for its app, the app's entry too, so later
    /// forwards fail fast instead of hanging.
    pub fn forget(&self, conn: &Connection) -> Option<String> {
        let mut state = mutex_lock_or_recover(&self.state);
        state.conn_paths.remove(&conn.id());
        let app_name = state.conn_apps.remove(&conn.id())?;
        if let Some(AppEntry::Attached(registered)) = state.apps.get(&app_name) {
            if registered.id() == conn.id() {
                state.apps.remove(&app_name);
                info!("app '{}' unreachable, connection lost", app_name);
            }
        }
        Some(app_name)
    }

    /// Explicit termination: clears the app entry regardless of state.
    pub fn drop_app(&self, app_name: &str) {
        mutex_lock_or_recover(&self.state).apps.remove(app_name);
    }
}
