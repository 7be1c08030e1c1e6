//! Core types for artifact storage.

use std::fmt;

use thiserror::Error;

/// Errors that can occur while persisting or relocating artifacts.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operation
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Artifact not present where it was expected
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// A file already occupies the target name in the working store
    #[error("Artifact already exists: {0}")]
    AlreadyExists(String),

    /// The quarantine store already holds an artifact with this name
    #[error("Artifact already quarantined: {0}")]
    AlreadyQuarantined(String),

    /// Quarantined artifacts are never read back by the intake path
    #[error("Artifact is isolated in quarantine: {0}")]
    Isolated(String),

    /// Storage name would escape the storage directory
    #[error("Invalid storage name: {0:?}")]
    InvalidName(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Opaque, generated name an artifact is stored under.
///
/// Never the raw client filename; see [`crate::intake::identifier`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageName(String);

impl StorageName {
    /// Wrap an already-generated name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the name is a single, non-hidden path component.
    pub fn is_contained(&self) -> bool {
        let name = self.0.as_str();
        !name.is_empty()
            && !name.starts_with('.')
            && !name.contains("..")
            && !name.chars().any(|c| c == '/' || c == '\\' || c.is_control())
    }
}

impl fmt::Display for StorageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which store currently holds an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Working,
    Quarantine,
}

/// Lifecycle of a stored artifact.
///
/// `Pending → Accepted` keeps the artifact where it is; `Pending → Quarantined`
/// moves it. Nothing leaves `Quarantined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    Pending,
    Accepted,
    Quarantined,
}

/// An artifact whose bytes have been persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    name: StorageName,
    location: Location,
    state: ArtifactState,
}

impl StoredArtifact {
    /// A freshly persisted artifact sitting in the working store.
    pub fn pending(name: StorageName) -> Self {
        Self {
            name,
            location: Location::Working,
            state: ArtifactState::Pending,
        }
    }

    pub fn name(&self) -> &StorageName {
        &self.name
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn state(&self) -> ArtifactState {
        self.state
    }

    /// Mark every check as passed. The artifact stays in the working store.
    pub fn accept(self) -> Self {
        debug_assert_eq!(self.state, ArtifactState::Pending);
        Self {
            state: ArtifactState::Accepted,
            ..self
        }
    }

    pub(crate) fn into_quarantined(self) -> Self {
        Self {
            location: Location::Quarantine,
            state: ArtifactState::Quarantined,
            ..self
        }
    }
}
