//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!
//! Registration:
//!     ProxyConfig.interceptor (raw option map)
//!     → interceptor.rs (defaults, tracking_url check)
//!     → InterceptorConfig shared via Arc by every request
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod interceptor;
pub mod loader;
pub mod schema;
pub mod validation;

pub use interceptor::InterceptorConfig;
pub use loader::{load_config, ConfigError};
pub use schema::ObservabilityConfig;
pub use schema::ProxyConfig;
pub use schema::ListenerConfig;
pub use schema::UpstreamConfig;
pub use validation::ValidationError;
