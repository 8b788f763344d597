use std::process::{Command, Stdio};

use tracing::info;

use crate::error::BridgeError;

/// Process start is a per-OS concern the router only reaches through
/// this seam; tests and embedders substitute their own.
pub trait AppLauncher: Send + Sync {
    /// Starts the application detached and returns its pid. The launched
    /// process is expected to connect back and register itself; the
    /// launcher does not wait for that.
    fn launch(&self, program: &str, args: &[String]) -> Result<u32, BridgeError>;
}

/// Default launcher: spawn detached with all stdio silenced.
pub struct ProcessLauncher;

impl AppLauncher for ProcessLauncher {
    fn launch(&self, program: &str, args: &[String]) -> Result<u32, BridgeError> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| BridgeError::Launch {
                program: program.to_string(),
                reason: err.to_string(),
            })?;

        let pid = child.id();
        info!("launched '{}' (pid {})", program, pid);
        Ok(pid)
    }
}

/// Short routing name for an app given either a name or a full path:
/// the executable basename, extension stripped.
pub fn app_basename(name_or_path: &str) -> String {
    let base = name_or_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name_or_path);
    match base.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem.to_string(),
        _ => base.to_string(),
    }
}
