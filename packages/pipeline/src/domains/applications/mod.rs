pub mod credentials;
pub mod models;
pub mod store;

pub use credentials::{CredentialStore, PgCredentialStore, PlatformCredentials};
pub use models::*;
pub use store::{ApplicationStore, PgApplicationStore};
