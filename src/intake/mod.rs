//! Upload intake pipeline.
//!
//! # Data Flow
//! ```text
//! UploadRequest (client addr, claimed filename, bytes)
//!     → extension.rs   (allowlist gate; rejection persists nothing)
//!     → identifier.rs  (<uuid>_<sanitized name>)
//!     → storage        (atomic write into the working store)
//!     → sniff.rs       (media type from content only)
//!     → consistency.rs (sniffed type ∈ permitted types for the extension)
//!     → signatures     (single-pass rule scan)
//!     → Accepted | Quarantined | Rejected   (+ one audit record)
//! ```
//!
//! # Design Decisions
//! - Every check failure is terminal; there are no retries
//! - Content checks always run on stored bytes, so the allowlist alone
//!   never accepts a file
//! - Client messages are generic; detail goes to the audit trail

pub mod consistency;
pub mod error;
pub mod extension;
pub mod identifier;
pub mod pipeline;
pub mod policy;
pub mod sniff;
pub mod types;

pub use error::PipelineError;
pub use identifier::{sanitize_filename, storage_name, IdGenerator, RngIdGenerator};
pub use pipeline::Pipeline;
pub use policy::IntakePolicy;
pub use sniff::ContentSniffer;
pub use types::{
    AcceptedUpload, Extension, FilePart, MediaType, Outcome, PipelineState, Stage, UploadRequest,
    ValidationVerdict,
};
