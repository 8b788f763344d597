use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("property '{property}' not supported on {element}")]
    PropertyNotSupported { element: String, property: String },

    #[error("{0}")]
    Backend(String),
}

/// The UI-toolkit seam. Introspection and gesture simulation live on the
/// toolkit side of this trait; the engine only routes to it. Element
/// handles are opaque strings minted by the implementation and echoed
/// back by the driver on later commands.
pub trait UiDriver: Send + Sync {
    fn find_by_name(&self, name: &str) -> Result<Vec<String>, DriverError>;
    fn find_by_class(&self, class: &str) -> Result<Vec<String>, DriverError>;
    fn find_by_text(&self, text: &str) -> Result<Vec<String>, DriverError>;
    fn find_by_xpath(&self, xpath: &str) -> Result<Vec<String>, DriverError>;
    fn find_by_property(&self, property: &str, value: &Value) -> Result<Vec<String>, DriverError>;

    fn click(&self, element: &str) -> Result<(), DriverError>;
    fn set_property(&self, element: &str, property: &str, value: &Value)
    -> Result<(), DriverError>;
    fn property(&self, element: &str, property: &str) -> Result<Value, DriverError>;

    /// Raw image bytes; the command layer base64-encodes for the wire.
    fn screenshot(&self) -> Result<Vec<u8>, DriverError>;
    fn dump_tree(&self) -> Result<Value, DriverError>;
}
