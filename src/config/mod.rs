//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, apply GATEKEEPER_* overrides)
//!     → validation.rs (semantic checks)
//!     → GatekeeperConfig (validated, immutable)
//!     → IntakePolicy built once, shared via Arc with the pipeline
//! ```
//!
//! # Design Decisions
//! - Config is loaded once at startup; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::GatekeeperConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::PolicyConfig;
pub use schema::TlsConfig;
pub use validation::ValidationError;
