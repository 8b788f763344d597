use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

use uibridge_proto::{ActionCall, Reply};

use crate::driver::{DriverError, UiDriver};
use crate::router::CommandSet;

/// Generic UI-introspection commands, the base of every capability
/// chain. Each action is a thin adapter over [`UiDriver`]; toolkit- and
/// OS-specific sets sit in front of this one and shadow what they must.
pub struct UiCommandSet<D: UiDriver> {
    driver: D,
}

impl<D: UiDriver> UiCommandSet<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }
}

impl<D: UiDriver> CommandSet for UiCommandSet<D> {
    fn handle(&self, call: &ActionCall) -> Option<Reply> {
        let reply = match call.action.as_str() {
            "findByName" => find_reply(self.driver.find_by_name(call.param_str_or(0, ""))),
            "findByClass" => find_reply(self.driver.find_by_class(call.param_str_or(0, ""))),
            "findByText" => find_reply(self.driver.find_by_text(call.param_str_or(0, ""))),
            "findByXpath" => find_reply(self.driver.find_by_xpath(call.param_str_or(0, ""))),
            "findByProperty" => {
                let value = call.params.get(1).cloned().unwrap_or(Value::Null);
                find_reply(
                    self.driver
                        .find_by_property(call.param_str_or(0, ""), &value),
                )
            }
            "click" => unit_reply(self.driver.click(call.param_str_or(0, ""))),
            "setProperty" => {
                let value = call.params.get(2).cloned().unwrap_or(Value::Null);
                unit_reply(self.driver.set_property(
                    call.param_str_or(0, ""),
                    call.param_str_or(1, ""),
                    &value,
                ))
            }
            "getProperty" => match self
                .driver
                .property(call.param_str_or(0, ""), call.param_str_or(1, ""))
            {
                Ok(value) => Reply::ok(value),
                Err(err) => driver_error(err),
            },
            "getScreenshot" => match self.driver.screenshot() {
                Ok(bytes) => Reply::ok(json!(BASE64.encode(bytes))),
                Err(err) => driver_error(err),
            },
            "dumpTree" => match self.driver.dump_tree() {
                Ok(tree) => Reply::ok(tree),
                Err(err) => driver_error(err),
            },
            // The reply goes out before the client loop exits.
            "quit" => Reply::ok_empty(),
            _ => return None,
        };
        Some(reply)
    }
}

fn find_reply(result: Result<Vec<String>, DriverError>) -> Reply {
    match result {
        Ok(ids) => Reply::ok(json!(ids)),
        Err(err) => driver_error(err),
    }
}

fn unit_reply(result: Result<(), DriverError>) -> Reply {
    match result {
        Ok(()) => Reply::ok_empty(),
        Err(err) => driver_error(err),
    }
}

fn driver_error(err: DriverError) -> Reply {
    Reply::error(&err.to_string())
}
