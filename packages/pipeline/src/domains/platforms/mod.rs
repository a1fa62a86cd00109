pub mod adapter;
pub mod adapters;
pub mod apply_flow;
pub mod interaction;
pub mod login_flow;
pub mod platform;
pub mod registry;
pub mod site;

pub use adapter::{ApplyResult, LoginResult, PlatformAdapter};
pub use apply_flow::{ApplyLimits, ApplyState, SUBMIT_PATTERN};
pub use platform::Platform;
pub use registry::AdapterRegistry;
pub use site::{SiteAdapter, SiteProfile};
