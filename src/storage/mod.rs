//! Artifact storage subsystem.
//!
//! # Data Flow
//! ```text
//! Validated upload bytes
//!     → local.rs (write .partial-<name>, fsync, rename into working store)
//!     → pipeline reads the artifact back for content checks
//!     → quarantine.rs (rename into quarantine store on a failed check)
//! ```
//!
//! # Design Decisions
//! - Names are generated identifiers, never the client filename
//! - Writes and relocations are atomic renames within one filesystem
//! - Quarantine never overwrites; a collision is a loud failure

pub mod local;
pub mod quarantine;
pub mod traits;
pub mod types;

pub use local::LocalArtifactStore;
pub use quarantine::QuarantineManager;
pub use traits::ArtifactStore;
pub use types::{ArtifactState, Location, StorageError, StorageName, StorageResult, StoredArtifact};
