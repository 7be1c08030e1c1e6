//! Upload gatekeeper library.

pub mod audit;
pub mod config;
pub mod http;
pub mod intake;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod signatures;
pub mod storage;

pub use config::schema::GatekeeperConfig;
pub use http::HttpServer;
pub use intake::Pipeline;
pub use lifecycle::Shutdown;
