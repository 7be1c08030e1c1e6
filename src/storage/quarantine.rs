//! Quarantine manager.
//!
//! Moves artifacts that failed a content check into the isolated store.
//! Quarantined artifacts are never deleted, served, or read again by intake.

use std::sync::Arc;

use super::traits::ArtifactStore;
use super::types::{StorageError, StorageResult, StoredArtifact};
use super::Location;

#[derive(Clone)]
pub struct QuarantineManager {
    store: Arc<dyn ArtifactStore>,
}

impl QuarantineManager {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Relocate `artifact` into quarantine and return it marked quarantined.
    ///
    /// # Errors
    ///
    /// A second quarantine of the same name fails with
    /// `StorageError::AlreadyQuarantined`; existing evidence is left untouched.
    pub async fn quarantine(&self, artifact: StoredArtifact, reason: &str) -> StorageResult<StoredArtifact> {
        if artifact.location() == Location::Quarantine {
            return Err(StorageError::AlreadyQuarantined(artifact.name().to_string()));
        }

        self.store.relocate_to_quarantine(&artifact).await?;

        tracing::warn!(stored = %artifact.name(), reason, "Artifact quarantined");
        Ok(artifact.into_quarantined())
    }
}
