//! HTTP transport boundary.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware, body cap)
//!     → request.rs (request ID, span)
//!     → upload.rs (multipart → UploadRequest; transport refusals audited)
//!     → intake::Pipeline
//!     → response.rs (JSON body, status mapping)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod upload;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::{ErrorResponse, HealthResponse, UploadResponse};
pub use server::{AppState, HttpServer};
