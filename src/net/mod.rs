//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! listener.bind_address
//!     → listener.rs (parse, bind TCP socket)
//!     → tls.rs (optional rustls config from PEM files)
//!     → Hand off to the HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bind failures are fatal at startup
//! - TLS is optional and handled transparently by `axum-server`

pub mod listener;
pub mod tls;

pub use listener::{bind, ListenerError};
pub use tls::{load_tls_config, TlsError};
