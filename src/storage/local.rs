//! Local filesystem storage implementation

use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::task;

use super::traits::ArtifactStore;
use super::types::{Location, StorageError, StorageName, StorageResult, StoredArtifact};

/// Prefix of in-flight writes; never a valid storage name.
const PARTIAL_PREFIX: &str = ".partial-";

/// Two sibling directories on one filesystem: the working store and the
/// quarantine store.
///
/// # Directory Structure
///
/// ```text
/// uploads/
/// ├── 550e8400-e29b-41d4-a716-446655440000_report.pdf
/// └── .partial-a3bb189e-..._photo.png      (write in progress)
/// quarantine/                               (mode 0700)
/// └── 7c9e6679-7425-40de-944b-e07fc1f90ae7_image.png
/// ```
///
/// Both directories must live on the same filesystem: relocation is a hard
/// link followed by an unlink, and a cross-device move fails with a storage
/// fault instead of falling back to copy-and-delete.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    working: PathBuf,
    quarantine: PathBuf,
}

impl LocalArtifactStore {
    /// Open (and create if needed) the working and quarantine directories.
    ///
    /// # Errors
    ///
    /// Returns an error if either path exists but is not a directory, or
    /// cannot be created.
    pub async fn open(working: impl Into<PathBuf>, quarantine: impl Into<PathBuf>) -> StorageResult<Self> {
        let working = working.into();
        let quarantine = quarantine.into();

        for dir in [&working, &quarantine] {
            if dir.exists() && !dir.is_dir() {
                return Err(StorageError::Io(std::io::Error::new(
                    ErrorKind::InvalidInput,
                    format!("{} is not a directory", dir.display()),
                )));
            }
            fs::create_dir_all(dir).await?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&quarantine, std::fs::Permissions::from_mode(0o700)).await?;
        }

        tracing::info!(
            working = %working.display(),
            quarantine = %quarantine.display(),
            "Artifact store ready"
        );

        Ok(Self { working, quarantine })
    }

    pub fn working_dir(&self) -> &Path {
        &self.working
    }

    pub fn quarantine_dir(&self) -> &Path {
        &self.quarantine
    }

    fn checked(name: &StorageName) -> StorageResult<&str> {
        if name.is_contained() {
            Ok(name.as_str())
        } else {
            Err(StorageError::InvalidName(name.to_string()))
        }
    }
}

/// Removes an in-flight write unless disarmed.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Could not remove partial artifact"
            ),
        }
    }
}

/// Write `data` to `partial`, then link it in under `final_path`.
///
/// `hard_link` refuses an existing target, so the final name is claimed
/// atomically and a reader only ever sees complete content.
fn write_atomically(partial: PathBuf, final_path: &Path, data: &[u8]) -> io::Result<()> {
    let mut guard = PartialFile::new(partial);

    let mut f = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&guard.path)?;
    f.write_all(data)?;
    f.flush()?;
    f.sync_all()?;
    drop(f);

    std::fs::hard_link(&guard.path, final_path)?;

    // The artifact is in place; the partial name is only a second link now
    if let Err(e) = std::fs::remove_file(&guard.path) {
        tracing::warn!(path = %guard.path.display(), error = %e, "Could not unlink partial artifact");
    }
    guard.disarm();
    Ok(())
}

/// Move `source` to `dest` without ever replacing `dest`.
fn relocate_no_replace(source: &Path, dest: &Path) -> io::Result<()> {
    std::fs::hard_link(source, dest)?;
    if let Err(e) = std::fs::remove_file(source) {
        // Never leave the artifact visible in both stores
        if let Err(undo) = std::fs::remove_file(dest) {
            tracing::error!(
                dest = %dest.display(),
                error = %undo,
                "Artifact left in both stores after failed relocation"
            );
        }
        return Err(e);
    }
    Ok(())
}

async fn blocking<T, F>(op: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match task::spawn_blocking(op).await {
        Ok(result) => result,
        Err(e) => Err(io::Error::new(ErrorKind::Other, e)),
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn persist(&self, name: &StorageName, data: Bytes) -> StorageResult<StoredArtifact> {
        let file_name = Self::checked(name)?;
        let final_path = self.working.join(file_name);
        let partial_path = self.working.join(format!("{PARTIAL_PREFIX}{file_name}"));
        let len = data.len();

        // Runs to completion on the blocking pool even if this future is dropped
        match blocking(move || write_atomically(partial_path, &final_path, &data)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!(stored = %name, bytes = len, "Artifact persisted");
        Ok(StoredArtifact::pending(name.clone()))
    }

    async fn read(&self, artifact: &StoredArtifact) -> StorageResult<Vec<u8>> {
        if artifact.location() == Location::Quarantine {
            return Err(StorageError::Isolated(artifact.name().to_string()));
        }

        let path = self.working.join(Self::checked(artifact.name())?);
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(artifact.name().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn relocate_to_quarantine(&self, artifact: &StoredArtifact) -> StorageResult<()> {
        if artifact.location() == Location::Quarantine {
            return Err(StorageError::AlreadyQuarantined(artifact.name().to_string()));
        }

        let file_name = Self::checked(artifact.name())?;
        let source = self.working.join(file_name);
        let dest = self.quarantine.join(file_name);

        let target = dest.clone();
        match blocking(move || relocate_no_replace(&source, &target)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyQuarantined(artifact.name().to_string()));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(artifact.name().to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o400)).await {
                tracing::warn!(stored = %artifact.name(), error = %e, "Could not mark quarantined artifact read-only");
            }
        }

        Ok(())
    }
}
