use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{debug, info, warn};

use uibridge_proto::{ActionCall, HEADLESS_APP, Reply};

use crate::connection::Connection;
use crate::platform::app_basename;
use crate::router::{BridgeContext, CommandSet, HandlerTable};

/// The bridge's own command set: session setup, app lifecycle and the
/// `system:` namespace. Everything here is handled locally and never
/// forwarded.
pub struct SystemCommandSet;

impl CommandSet for SystemCommandSet {
    fn register(&self, table: &mut HandlerTable) {
        table.register("initialize", initialize);
        table.register("launchApp", launch_app);
        table.register("closeApp", close_app);
        table.register("listApps", list_apps);
        table.register("ping", ping);
        table.register("executeCommand_system_shell", system_shell);
        table.register("executeCommand_system_getenv", system_getenv);
        table.register("executeCommand_system_setenv", system_setenv);
    }
}

/// `initialize [appNameOrPath]` binds this connection to an app name.
/// A full path is remembered for launching; the basename is the routing
/// key. Does not register a live handler; only `appConnect` does that.
fn initialize(ctx: &BridgeContext, conn: &Arc<Connection>, call: &ActionCall) {
    let Some(name_or_path) = call.param_str(0) else {
        conn.send_reply(&Reply::error("initialize requires an app name"));
        return;
    };

    let name = app_basename(name_or_path);
    let full_path = (name_or_path != name).then_some(name_or_path);
    ctx.registry.set_conn_app(conn, &name, full_path);
    debug!("{} now addresses app '{}'", conn.peer(), name);
    conn.send_reply(&Reply::ok_empty());
}

/// `launchApp [appNameOrPath, args...]` starts the process and parks
/// this handler until the app's connect-back registers it or the launch
/// timeout lapses. Other connections keep being serviced meanwhile; only
/// this handler's thread waits. The timeout completion is deliberately
/// not error-coded; the value says whether the app attached.
fn launch_app(ctx: &BridgeContext, conn: &Arc<Connection>, call: &ActionCall) {
    let Some(program) = call.param_str(0) else {
        conn.send_reply(&Reply::error("launchApp requires an app name or path"));
        return;
    };

    let name = app_basename(program);
    let full_path = (program != name).then_some(program);
    ctx.registry.set_conn_app(conn, &name, full_path);

    if ctx.registry.app_connection(&name).is_some() {
        conn.send_reply(&Reply::ok(json!("already running")));
        return;
    }

    let args = call.params_from(1);

    if name == HEADLESS_APP {
        // No UI socket expected; no rendezvous, no registry entry.
        match ctx.launcher.launch(program, &args) {
            Ok(_) => conn.send_reply(&Reply::ok_empty()),
            Err(err) => {
                warn!("launch of '{}' failed: {}", program, err);
                conn.send_reply(&Reply::error(&err.to_string()));
            }
        }
        return;
    }

    // Marked before spawning so an instant connect-back is not missed.
    ctx.registry.mark_launching(&name);
    if let Err(err) = ctx.launcher.launch(program, &args) {
        ctx.registry.clear_launching(&name);
        warn!("launch of '{}' failed: {}", program, err);
        conn.send_reply(&Reply::error(&err.to_string()));
        return;
    }

    if ctx.registry.wait_for_app(&name, ctx.config.launch_timeout) {
        conn.send_reply(&Reply::ok_empty());
    } else {
        info!(
            "app '{}' did not connect within {:?}",
            name, ctx.config.launch_timeout
        );
        conn.send_reply(&Reply::ok(json!(format!(
            "launched, but '{}' did not connect within {:?}",
            name, ctx.config.launch_timeout
        ))));
    }
}

/// `closeApp` asks this connection's app to quit, then polls for its
/// deregistration, tolerating an app that never confirms.
fn close_app(ctx: &BridgeContext, conn: &Arc<Connection>, _call: &ActionCall) {
    let Some(name) = ctx.registry.app_name_for(conn) else {
        conn.send_reply(&Reply::error("closeApp: no app bound to this connection"));
        return;
    };

    if let Some(app_conn) = ctx.registry.app_connection(&name) {
        let quit = ActionCall::new("quit", vec![]);
        match quit.to_bytes() {
            // Fire and forget; confirmation is the disconnect itself.
            Ok(bytes) => {
                let _ = app_conn.send(&bytes);
            }
            Err(err) => warn!("failed to encode quit command: {}", err),
        }
    }

    let deadline = Instant::now() + ctx.config.close_timeout;
    while ctx.registry.app_connection(&name).is_some() && Instant::now() < deadline {
        std::thread::sleep(ctx.config.close_poll_interval);
    }

    if ctx.registry.app_connection(&name).is_some() {
        info!("app '{}' never confirmed close, dropping registration", name);
    }
    ctx.registry.drop_app(&name);
    conn.send_reply(&Reply::ok_empty());
}

fn list_apps(ctx: &BridgeContext, conn: &Arc<Connection>, _call: &ActionCall) {
    conn.send_reply(&Reply::ok(json!(ctx.registry.registered_apps())));
}

fn ping(_ctx: &BridgeContext, conn: &Arc<Connection>, _call: &ActionCall) {
    conn.send_reply(&Reply::ok(json!("pong")));
}

/// `system:shell [program, args...]` runs a host command to completion
/// and reports its output. Test setups use this for fixtures; it is not
/// a remote shell for the app under test.
fn system_shell(_ctx: &BridgeContext, conn: &Arc<Connection>, call: &ActionCall) {
    let Some(program) = call.param_str(0) else {
        conn.send_reply(&Reply::error("system:shell requires a command"));
        return;
    };

    let output = std::process::Command::new(program)
        .args(call.params_from(1))
        .output();

    match output {
        Ok(output) => conn.send_reply(&Reply::ok(json!({
            "exitCode": output.status.code().unwrap_or(-1),
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
        }))),
        Err(err) => conn.send_reply(&Reply::error(&format!(
            "failed to run '{}': {}",
            program, err
        ))),
    }
}

fn system_getenv(_ctx: &BridgeContext, conn: &Arc<Connection>, call: &ActionCall) {
    let Some(key) = call.param_str(0) else {
        conn.send_reply(&Reply::error("system:getenv requires a variable name"));
        return;
    };
    match std::env::var(key) {
        Ok(value) => conn.send_reply(&Reply::ok(json!(value))),
        Err(_) => conn.send_reply(&Reply::error(&format!("'{}' is not set", key))),
    }
}

fn system_setenv(_ctx: &BridgeContext, conn: &Arc<Connection>, call: &ActionCall) {
    let (Some(key), Some(value)) = (call.param_str(0), call.param_str(1)) else {
        conn.send_reply(&Reply::error("system:setenv requires a name and a value"));
        return;
    };
    std::env::set_var(key, value);
    conn.send_reply(&Reply::ok_empty());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::error::BridgeError;
    use crate::forwarder::RequestForwarder;
    use crate::platform::AppLauncher;
    use crate::registry::AppRegistry;
    use crate::router::CommandRouter;
    use std::io::Read;
    use std::os::unix::net::UnixStream;
    use std::time::Duration;
    use uibridge_proto::SocketStream;

    struct NoopLauncher;

    impl AppLauncher for NoopLauncher {
        fn launch(&self, _program: &str, _args: &[String]) -> Result<u32, BridgeError> {
            Ok(4242)
        }
    }

    struct FailingLauncher;

    impl AppLauncher for FailingLauncher {
        fn launch(&self, program: &str, _args: &[String]) -> Result<u32, BridgeError> {
            Err(BridgeError::Launch {
                program: program.to_string(),
                reason: "refused".to_string(),
            })
        }
    }

    fn router_with(launcher: Arc<dyn AppLauncher>) -> (CommandRouter, Arc<AppRegistry>) {
        let registry = Arc::new(AppRegistry::new());
        let ctx = Arc::new(BridgeContext {
            registry: Arc::clone(&registry),
            forwarder: RequestForwarder::new(Arc::clone(&registry), Duration::from_millis(200)),
            launcher,
            config: BridgeConfig::from_env()
                .with_launch_timeout(Duration::from_millis(150))
                .with_close_timing(Duration::from_millis(10), Duration::from_millis(60)),
        });
        (CommandRouter::new(ctx, &[&SystemCommandSet]), registry)
    }

    fn test_conn() -> (Arc<Connection>, UnixStream) {
        let (near, far) = UnixStream::pair().unwrap();
        let (conn, _reader) = Connection::new(SocketStream::from(near), "test".to_string()).unwrap();
        (Arc::new(conn), far)
    }

    fn read_reply(far: &mut UnixStream) -> Reply {
        let mut buf = [0u8; 8192];
        let n = far.read(&mut buf).unwrap();
        serde_json::from_slice(&buf[..n]).unwrap()
    }

    fn action(action: &str, params: serde_json::Value) -> Vec<u8> {
        json!({"cmd": "action", "action": action, "params": params})
            .to_string()
            .into_bytes()
    }

    #[test]
    fn test_initialize_records_basename_and_path() {
        let (router, registry) = router_with(Arc::new(NoopLauncher));
        let (conn, mut far) = test_conn();
        router.dispatch(&conn, &action("initialize", json!(["/opt/apps/calc"])));
        assert!(read_reply(&mut far).is_success());
        assert_eq!(registry.app_name_for(&conn).as_deref(), Some("calc"));
        assert_eq!(
            registry.full_path_for(&conn).as_deref(),
            Some("/opt/apps/calc")
        );
    }

    #[test]
    fn test_initialize_without_params_errors() {
        let (router, _registry) = router_with(Arc::new(NoopLauncher));
        let (conn, mut far) = test_conn();
        router.dispatch(&conn, &action("initialize", json!([])));
        assert!(!read_reply(&mut far).is_success());
    }

    #[test]
    fn test_launch_times_out_without_connect_back_but_not_error_coded() {
        let (router, registry) = router_with(Arc::new(NoopLauncher));
        let (conn, mut far) = test_conn();
        router.dispatch(&conn, &action("launchApp", json!(["calc"])));
        let reply = read_reply(&mut far);
        assert_eq!(reply.status, 0);
        assert!(reply.value.as_str().unwrap_or("").contains("did not connect"));
        // Launch marker stays; the app may still attach later.
        assert!(registry.registered_apps().contains(&"calc".to_string()));
    }

    #[test]
    fn test_launch_rendezvous_unblocks_on_connect_back() {
        let (router, registry) = router_with(Arc::new(NoopLauncher));
        let (conn, mut far) = test_conn();

        let declarer = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(40));
                let (app_conn, _far) = test_conn();
                std::mem::forget(_far);
                registry.declare_app(&app_conn, "calc");
            })
        };

        router.dispatch(&conn, &action("launchApp", json!(["calc"])));
        let reply = read_reply(&mut far);
        assert!(reply.is_success());
        assert_eq!(reply.value, json!(""));
        declarer.join().unwrap();
    }

    #[test]
    fn test_launch_headless_skips_rendezvous() {
        let (router, _registry) = router_with(Arc::new(NoopLauncher));
        let (conn, mut far) = test_conn();
        let start = Instant::now();
        router.dispatch(&conn, &action("launchApp", json!(["headless"])));
        assert!(read_reply(&mut far).is_success());
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_launch_failure_is_error_coded() {
        let (router, _registry) = router_with(Arc::new(FailingLauncher));
        let (conn, mut far) = test_conn();
        router.dispatch(&conn, &action("launchApp", json!(["calc"])));
        let reply = read_reply(&mut far);
        assert_ne!(reply.status, 0);
        assert!(reply.value.as_str().unwrap().contains("calc"));
    }

    #[test]
    fn test_failed_launch_leaves_no_registry_entry() {
        let (router, registry) = router_with(Arc::new(FailingLauncher));
        let (conn, mut far) = test_conn();
        router.dispatch(&conn, &action("launchApp", json!(["ghostapp"])));
        assert!(!read_reply(&mut far).is_success());
        // A spawn that never happened must not linger as a pending app.
        assert!(registry.registered_apps().is_empty());
    }

    #[test]
    fn test_headless_launch_registers_nothing() {
        let (router, registry) = router_with(Arc::new(NoopLauncher));
        let (conn, mut far) = test_conn();
        router.dispatch(&conn, &action("launchApp", json!(["headless"])));
        assert!(read_reply(&mut far).is_success());
        assert!(registry.registered_apps().is_empty());
    }

    #[test]
    fn test_launch_already_running_short_circuits() {
        let (router, registry) = router_with(Arc::new(NoopLauncher));
        let (app_conn, _app_far) = test_conn();
        registry.declare_app(&app_conn, "calc");

        let (conn, mut far) = test_conn();
        router.dispatch(&conn, &action("launchApp", json!(["calc"])));
        let reply = read_reply(&mut far);
        assert!(reply.is_success());
        assert_eq!(reply.value, json!("already running"));
    }

    #[test]
    fn test_close_app_sends_quit_and_tolerates_silence() {
        let (router, registry) = router_with(Arc::new(NoopLauncher));
        let (app_conn, mut app_far) = test_conn();
        registry.declare_app(&app_conn, "calc");

        let (conn, mut far) = test_conn();
        registry.set_conn_app(&conn, "calc", None);
        router.dispatch(&conn, &action("closeApp", json!([])));

        // The quit command reached the app even though it never confirmed.
        let mut buf = [0u8; 256];
        let n = app_far.read(&mut buf).unwrap();
        let quit: ActionCall = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(quit.action, "quit");

        assert!(read_reply(&mut far).is_success());
        assert!(registry.app_connection("calc").is_none());
    }

    #[test]
    fn test_close_app_without_binding_errors() {
        let (router, _registry) = router_with(Arc::new(NoopLauncher));
        let (conn, mut far) = test_conn();
        router.dispatch(&conn, &action("closeApp", json!([])));
        assert!(!read_reply(&mut far).is_success());
    }

    #[test]
    fn test_list_apps() {
        let (router, registry) = router_with(Arc::new(NoopLauncher));
        let (app_conn, _app_far) = test_conn();
        registry.declare_app(&app_conn, "calc");

        let (conn, mut far) = test_conn();
        router.dispatch(&conn, &action("listApps", json!([])));
        assert_eq!(read_reply(&mut far).value, json!(["calc"]));
    }

    #[test]
    fn test_system_shell_captures_output() {
        let (router, _registry) = router_with(Arc::new(NoopLauncher));
        let (conn, mut far) = test_conn();
        router.dispatch(
            &conn,
            &action("system:shell", json!(["echo", "hi"])),
        );
        let reply = read_reply(&mut far);
        assert!(reply.is_success());
        assert_eq!(reply.value["exitCode"], 0);
        assert_eq!(reply.value["stdout"], "hi\n");
    }

    #[test]
    fn test_system_shell_spawn_failure_is_error() {
        let (router, _registry) = router_with(Arc::new(NoopLauncher));
        let (conn, mut far) = test_conn();
        router.dispatch(
            &conn,
            &action("system:shell", json!(["/nonexistent/tool"])),
        );
        assert!(!read_reply(&mut far).is_success());
    }

    #[test]
    fn test_setenv_then_getenv_round_trip() {
        let (router, _registry) = router_with(Arc::new(NoopLauncher));
        let (conn, mut far) = test_conn();
        router.dispatch(
            &conn,
            &action("system:setenv", json!(["UIBRIDGE_TEST_VAR", "set-by-test"])),
        );
        assert!(read_reply(&mut far).is_success());

        router.dispatch(&conn, &action("system:getenv", json!(["UIBRIDGE_TEST_VAR"])));
        assert_eq!(read_reply(&mut far).value, json!("set-by-test"));
    }

    #[test]
    fn test_getenv_missing_variable_errors() {
        let (router, _registry) = router_with(Arc::new(NoopLauncher));
        let (conn, mut far) = test_conn();
        router.dispatch(
            &conn,
            &action("system:getenv", json!(["UIBRIDGE_DEFINITELY_UNSET"])),
        );
        assert!(!read_reply(&mut far).is_success());
    }
}
