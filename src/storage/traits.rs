//! Storage backend abstraction.

use async_trait::async_trait;
use bytes::Bytes;

use super::types::{StorageName, StorageResult, StoredArtifact};

/// Persistence capability the intake pipeline depends on.
///
/// Implementations must make both writes and relocations atomic: a reader
/// never sees a partially written artifact under its final name, and a
/// relocated artifact is never visible in both stores at once.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist `data` in the working store under `name`.
    ///
    /// # Errors
    ///
    /// Fails if the name is not contained, already taken, or the write fails.
    async fn persist(&self, name: &StorageName, data: Bytes) -> StorageResult<StoredArtifact>;

    /// Read an artifact's bytes back from the working store.
    ///
    /// # Errors
    ///
    /// Quarantined artifacts are refused with `StorageError::Isolated`.
    async fn read(&self, artifact: &StoredArtifact) -> StorageResult<Vec<u8>>;

    /// Atomically move an artifact from the working store into quarantine,
    /// keeping its name.
    ///
    /// # Errors
    ///
    /// Refuses with `StorageError::AlreadyQuarantined` rather than overwrite.
    async fn relocate_to_quarantine(&self, artifact: &StoredArtifact) -> StorageResult<()>;
}
