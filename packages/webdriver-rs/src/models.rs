use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// W3C identifier under which element references are serialized.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Every WebDriver response wraps its payload in `{"value": ...}`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub value: T,
}

/// Error payload returned with a non-2xx status.
#[derive(Debug, Deserialize)]
pub struct ErrorValue {
    pub error: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct NewSessionValue {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct NewWindowValue {
    pub handle: String,
}

/// Opaque reference to an element in the remote document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    #[serde(rename = "element-6066-11e4-a52e-4f735466cecf")]
    pub id: String,
}

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Chrome launch capabilities.
#[derive(Debug, Clone, Default)]
pub struct ChromeCapabilities {
    pub args: Vec<String>,
    pub exclude_switches: Vec<String>,
    pub page_load_strategy: Option<String>,
}

impl ChromeCapabilities {
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn exclude_switch(mut self, switch: impl Into<String>) -> Self {
        self.exclude_switches.push(switch.into());
        self
    }

    pub fn to_json(&self) -> Value {
        let mut always_match = json!({
            "browserName": "chrome",
            "goog:chromeOptions": {
                "args": self.args,
                "excludeSwitches": self.exclude_switches,
            }
        });
        if let Some(strategy) = &self.page_load_strategy {
            always_match["pageLoadStrategy"] = json!(strategy);
        }
        json!({ "capabilities": { "alwaysMatch": always_match } })
    }
}

/// Session timeouts, in milliseconds.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Timeouts {
    #[serde(rename = "pageLoad")]
    pub page_load: u64,
    pub script: u64,
    pub implicit: u64,
}
