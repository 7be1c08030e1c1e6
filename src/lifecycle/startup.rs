//! Startup orchestration.
//!
//! # Responsibilities
//! - Compile the signature rules
//! - Open the working/quarantine stores and the audit file
//! - Assemble the pipeline from immutable, injected collaborators
//!
//! # Design Decisions
//! - Fail fast: a bad rule file or unwritable directory aborts startup
//! - Subsystems initialize in order, not concurrently

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::audit::{AuditLogger, FileAuditSink};
use crate::config::GatekeeperConfig;
use crate::intake::{IntakePolicy, Pipeline};
use crate::signatures::{RuleError, SignatureSet};
use crate::storage::{LocalArtifactStore, StorageError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("signature rules: {0}")]
    Rules(#[from] RuleError),

    #[error("artifact store: {0}")]
    Storage(#[from] StorageError),

    #[error("audit log {path}: {source}")]
    Audit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Compile the configured rule file.
pub fn load_rules(config: &GatekeeperConfig) -> Result<Arc<SignatureSet>, StartupError> {
    let path = Path::new(&config.signatures.rules_path);
    let rules = SignatureSet::load(path)?;
    tracing::info!(path = %path.display(), rules = rules.len(), "Signature rules compiled");
    Ok(Arc::new(rules))
}

/// Build the pipeline described by a validated configuration.
pub async fn bootstrap(config: &GatekeeperConfig) -> Result<Arc<Pipeline>, StartupError> {
    let rules = load_rules(config)?;

    let store = LocalArtifactStore::open(
        PathBuf::from(&config.storage.upload_dir),
        PathBuf::from(&config.storage.quarantine_dir),
    )
    .await?;

    let audit_path = PathBuf::from(&config.audit.log_path);
    let sink = FileAuditSink::open(&audit_path).map_err(|source| StartupError::Audit {
        path: audit_path.clone(),
        source,
    })?;
    tracing::info!(path = %audit_path.display(), "Audit log open");

    let policy = Arc::new(IntakePolicy::from_config(&config.policy));
    let pipeline = Pipeline::new(policy, Arc::new(store), rules, AuditLogger::new(Arc::new(sink)))
        .with_max_upload_bytes(config.limits.max_upload_bytes);

    Ok(Arc::new(pipeline))
}
