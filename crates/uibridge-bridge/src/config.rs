use std::env;
use std::time::Duration;

use uibridge_proto::{DEFAULT_MAX_FRAME_BYTES, Endpoint};

const DEFAULT_MAX_CONNECTIONS: usize = 64;
const DEFAULT_LAUNCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FORWARD_SILENCE_SECS: u64 = 30;
const DEFAULT_CLOSE_POLL_MILLIS: u64 = 500;
const DEFAULT_CLOSE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub endpoint: Endpoint,
    pub max_connections: usize,
    /// How long `launchApp` waits for the launched app to connect back.
    pub launch_timeout: Duration,
    /// Silence window for forwarded replies; restarts on every received
    /// fragment, so only a stalled app trips it.
    pub forward_silence: Duration,
    /// Poll cadence and bound while `closeApp` waits for deregistration.
    pub close_poll_interval: Duration,
    pub close_timeout: Duration,
    pub max_frame_bytes: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: Endpoint::from_env(),
            max_connections: env_parse("UIBRIDGE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),
            launch_timeout: Duration::from_secs(env_parse(
                "UIBRIDGE_LAUNCH_TIMEOUT",
                DEFAULT_LAUNCH_TIMEOUT_SECS,
            )),
            forward_silence: Duration::from_secs(env_parse(
                "UIBRIDGE_FORWARD_TIMEOUT",
                DEFAULT_FORWARD_SILENCE_SECS,
            )),
            close_poll_interval: Duration::from_millis(DEFAULT_CLOSE_POLL_MILLIS),
            close_timeout: Duration::from_secs(env_parse(
                "UIBRIDGE_CLOSE_TIMEOUT",
                DEFAULT_CLOSE_TIMEOUT_SECS,
            )),
            max_frame_bytes: env_parse("UIBRIDGE_MAX_FRAME", DEFAULT_MAX_FRAME_BYTES),
        }
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_launch_timeout(mut self, timeout: Duration) -> Self {
        self.launch_timeout = timeout;
        self
    }

    pub fn with_forward_silence(mut self, window: Duration) -> Self {
        self.forward_silence = window;
        self
    }

    pub fn with_close_timing(mut self, poll: Duration, timeout: Duration) -> Self {
        self.close_poll_interval = poll;
        self.close_timeout = timeout;
        self
    }

    pub fn with_max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
