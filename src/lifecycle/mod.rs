//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Signature rules → Artifact store → Audit sink → Pipeline
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain in-flight uploads → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, listeners last
//! - Fail fast: any startup error is fatal
//! - An upload already in the pipeline finishes and is audited

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{bootstrap, load_rules, StartupError};
