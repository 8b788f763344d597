use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, error, info, warn};

use uibridge_common::STATUS_ERROR;
use uibridge_proto::{Endpoint, FrameDecoder, Reply, SocketStream};

use crate::config::BridgeConfig;
use crate::connection::Connection;
use crate::error::BridgeError;
use crate::forwarder::RequestForwarder;
use crate::handlers::SystemCommandSet;
use crate::platform::{AppLauncher, ProcessLauncher};
use crate::registry::AppRegistry;
use crate::router::{BridgeContext, CommandRouter, CommandSet};
use crate::transport::Listener;

const ACCEPT_POLL: Duration = Duration::from_millis(10);
const READ_CHUNK: usize = 4096;

/// Accepts driver and app connections on one endpoint and runs a reader
/// loop per connection. All of them share one registry and router.
pub struct BridgeServer {
    listener: Listener,
    router: Arc<CommandRouter>,
    config: BridgeConfig,
    shutdown: Arc<AtomicBool>,
    active_connections: Arc<AtomicUsize>,
}

impl BridgeServer {
    /// Binds with the built-in system command set and process launcher.
    pub fn bind(config: BridgeConfig) -> Result<Self, BridgeError> {
        Self::bind_with(config, &[&SystemCommandSet], Arc::new(ProcessLauncher))
    }

    /// Binds with platform-specific command sets, most-specific first,
    /// and a custom launcher.
    pub fn bind_with(
        config: BridgeConfig,
        sets: &[&dyn CommandSet],
        launcher: Arc<dyn AppLauncher>,
    ) -> Result<Self, BridgeError> {
        let listener = Listener::bind(&config.endpoint)?;
        let registry = Arc::new(AppRegistry::new());
        let ctx = Arc::new(BridgeContext {
            registry: Arc::clone(&registry),
            forwarder: RequestForwarder::new(Arc::clone(&registry), config.forward_silence),
            launcher,
            config: config.clone(),
        });
        let router = Arc::new(CommandRouter::new(ctx, sets));

        Ok(Self {
            listener,
            router,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            active_connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// The endpoint actually bound; differs from the configured one when
    /// requesting an ephemeral TCP port.
    pub fn local_endpoint(&self) -> Result<Endpoint, BridgeError> {
        self.listener.local_endpoint()
    }

    /// Flag that stops the accept loop; share it with a signal handler.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Accept loop. Returns when the shutdown flag is raised; reader
    /// threads drain on their own as peers disconnect.
    pub fn run(&self) -> Result<(), BridgeError> {
        self.listener.set_nonblocking(true)?;
        info!(
            "bridge listening on {}",
            self.local_endpoint()?.to_string()
        );

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, peer)) => self.admit(stream, peer),
                Err(err)
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut =>
                {
                    thread::sleep(ACCEPT_POLL);
                }
                Err(err) => {
                    if !self.shutdown.load(Ordering::Relaxed) {
                        warn!("accept failed: {}", err);
                    }
                }
            }
        }

        info!("bridge shutting down");
        Ok(())
    }

    fn admit(&self, stream: SocketStream, peer: String) {
        if self.active_connections.load(Ordering::Relaxed) >= self.config.max_connections {
            warn!("rejecting {}: connection limit reached", peer);
            if let Ok((conn, _reader)) = Connection::new(stream, peer) {
                conn.send_reply(&Reply {
                    status: STATUS_ERROR,
                    value: json!("connection limit reached"),
                });
                conn.close();
            }
            return;
        }

        let (conn, reader) = match Connection::new(stream, peer) {
            Ok(pair) => pair,
            Err(err) => {
                warn!("failed to set up connection: {}", err);
                return;
            }
        };
        let conn = Arc::new(conn);
        debug!("accepted {} as connection {}", conn.peer(), conn.id());

        let router = Arc::clone(&self.router);
        let active = Arc::clone(&self.active_connections);
        let max_frame_bytes = self.config.max_frame_bytes;
        active.fetch_add(1, Ordering::Relaxed);

        let spawned = thread::Builder::new()
            .name(format!("conn-{}", conn.id()))
            .spawn(move || {
                connection_loop(&router, &conn, reader, max_frame_bytes);
                active.fetch_sub(1, Ordering::Relaxed);
            });
        if let Err(err) = spawned {
            error!("failed to spawn connection thread: {}", err);
            self.active_connections.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

/// Reads one connection until EOF. Raw bytes go to a pending forward's
/// reply slot when one is parked on this connection; everything else is
/// framed and dispatched. The disconnect path runs exactly once.
fn connection_loop(
    router: &Arc<CommandRouter>,
    conn: &Arc<Connection>,
    mut reader: SocketStream,
    max_frame_bytes: usize,
) {
    let mut decoder = FrameDecoder::with_limit(max_frame_bytes);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::ConnectionReset {
                    debug!("read error on {}: {}", conn.peer(), err);
                }
                break;
            }
        };

        if conn.offer_reply_chunk(&chunk[..n]) {
            continue;
        }

        match decoder.feed(&chunk[..n]) {
            Ok(frames) => {
                for frame in frames {
                    router.dispatch(conn, &frame);
                }
            }
            Err(err) => {
                warn!("dropping {}: {}", conn.peer(), err);
                conn.send_reply(&Reply::error(&err.to_string()));
                break;
            }
        }
    }

    conn.close();
    if let Some(app_name) = router.context().registry.forget(conn) {
        debug!("connection {} lost (app '{}')", conn.id(), app_name);
    } else {
        debug!("connection {} lost", conn.id());
    }
}

/// Binds, wires SIGINT/SIGTERM to the shutdown flag and runs until
/// signalled. Bind failure is fatal; the caller logs and exits.
pub fn start_bridge(config: BridgeConfig) -> Result<(), BridgeError> {
    let server = BridgeServer::bind(config)?;

    let shutdown = server.shutdown_handle();
    let mut signals = signal_hook::iterator::Signals::new([
        signal_hook::consts::SIGINT,
        signal_hook::consts::SIGTERM,
    ])
    .map_err(|e| BridgeError::SignalSetup(e.to_string()))?;
    thread::Builder::new()
        .name("signal-handler".to_string())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("received signal {}, shutting down", sig);
                shutdown.store(true, Ordering::SeqCst);
            }
        })
        .map_err(|e| BridgeError::SignalSetup(format!("failed to spawn signal handler: {}", e)))?;

    server.run()
}
