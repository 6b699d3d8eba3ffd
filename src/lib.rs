pub mod bridge;
pub mod config;
pub mod error;
pub mod infra;
pub mod request;
pub mod routes;
pub mod shared;

pub use bridge::{build_executor, Bridge};
pub use config::{Config, LineMode, TlsVersions};
pub use error::{BridgeError, RequestError, TrustError};
pub use infra::{install_trust_all_policy, installed_policy, TrustPolicy};
pub use request::{RequestExecutor, RequestSpec};
