use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use uibridge_common::{STATUS_ERROR, STATUS_NOT_IMPLEMENTED, STATUS_OK, STATUS_TIMEOUT};

/// App name meaning "no UI socket expected"; launches under this name
/// never wait for a connect-back and nothing can be forwarded to it.
pub const HEADLESS_APP: &str = "headless";

/// An action request: `{"cmd":"action","action":"<verb or ns:verb>","params":[...]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionCall {
    cmd: String,
    pub action: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

impl ActionCall {
    pub fn new(action: &str, params: Vec<Value>) -> Self {
        Self {
            cmd: "action".to_string(),
            action: action.to_string(),
            params,
        }
    }

    /// Positional param as a string. Missing and wrongly-typed params read
    /// the same way; handlers fall back to their documented defaults.
    pub fn param_str(&self, idx: usize) -> Option<&str> {
        self.params.get(idx).and_then(|v| v.as_str())
    }

    pub fn param_str_or<'a>(&'a self, idx: usize, default: &'a str) -> &'a str {
        self.param_str(idx).unwrap_or(default)
    }

    pub fn param_u64(&self, idx: usize, default: u64) -> u64 {
        self.params
            .get(idx)
            .and_then(|v| v.as_u64())
            .unwrap_or(default)
    }

    /// Remaining positional params from `idx` on, stringified.
    pub fn params_from(&self, idx: usize) -> Vec<String> {
        self.params
            .iter()
            .skip(idx)
            .map(|v| match v.as_str() {
                Some(s) => s.to_string(),
                None => v.to_string(),
            })
            .collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// A reply: `{"status":<int>,"value":<any>}`. Zero status is success.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reply {
    pub status: i64,
    pub value: Value,
}

impl Reply {
    pub fn ok(value: Value) -> Self {
        Self {
            status: STATUS_OK,
            value,
        }
    }

    pub fn ok_empty() -> Self {
        Self::ok(json!(""))
    }

    pub fn error(message: &str) -> Self {
        Self {
            status: STATUS_ERROR,
            value: json!(message),
        }
    }

    pub fn timeout(message: &str) -> Self {
        Self {
            status: STATUS_TIMEOUT,
            value: json!(message),
        }
    }

    pub fn not_implemented() -> Self {
        Self {
            status: STATUS_NOT_IMPLEMENTED,
            value: json!("not implemented"),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Registration payload an app sends right after connecting.
pub fn app_connect_payload(app_name: &str) -> Vec<u8> {
    json!({"appConnect": {"appName": app_name}})
        .to_string()
        .into_bytes()
}

/// Handler-table key for a `namespace:verb` action, colon replaced with
/// an underscore. Returns None for plain verbs.
pub fn execute_handler_key(action: &str) -> Option<String> {
    if action.contains(':') {
        Some(format!("executeCommand_{}", action.replace(':', "_")))
    } else {
        None
    }
}

/// One decoded frame, classified the way the bridge router classifies:
/// reply first, then registration, then action.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Reply(Reply),
    AppConnect { app_name: String },
    Action(ActionCall),
    Unrecognized,
}

impl Message {
    pub fn classify(value: &Value) -> Message {
        if let Some(status) = value.get("status").and_then(|s| s.as_i64()) {
            return Message::Reply(Reply {
                status,
                value: value.get("value").cloned().unwrap_or(Value::Null),
            });
        }

        if let Some(app_name) = value
            .get("appConnect")
            .and_then(|a| a.get("appName"))
            .and_then(|n| n.as_str())
        {
            return Message::AppConnect {
                app_name: app_name.to_string(),
            };
        }

        if value.get("cmd").and_then(|c| c.as_str()) == Some("action") {
            if let Some(action) = value.get("action").and_then(|a| a.as_str()) {
                let params = value
                    .get("params")
                    .and_then(|p| p.as_array())
                    .cloned()
                    .unwrap_or_default();
                return Message::Action(ActionCall::new(action, params));
            }
        }

        Message::Unrecognized
    }

    pub fn classify_bytes(bytes: &[u8]) -> Result<Message, serde_json::Error> {
        let value: Value = serde_json::from_slice(bytes)?;
        Ok(Message::classify(&value))
    }
}
