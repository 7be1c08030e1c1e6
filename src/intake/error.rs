//! Pipeline error taxonomy.
//!
//! `Display` is the client-facing message: fixed, generic, and free of
//! storage paths, rule identifiers and MIME detail. The detail lives in the
//! variant fields and goes to the audit trail only.

use thiserror::Error;

use crate::storage::StorageError;

use super::types::MediaType;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The form carried no file field.
    #[error("No file part")]
    MissingFilePart,

    /// The file field had an empty filename.
    #[error("No selected file")]
    EmptyFilename,

    /// Missing or non-allowlisted suffix.
    #[error("File extension not allowed")]
    DisallowedExtension { extension: Option<String> },

    /// Body larger than the configured cap.
    #[error("File too large")]
    SizeExceeded { limit: usize, observed: Option<u64> },

    /// Sniffed content type is not permitted for the claimed extension.
    #[error("Blocked: MIME mismatch")]
    MimeMismatch {
        detected: MediaType,
        expected: Vec<String>,
    },

    /// One or more signature rules matched.
    #[error("Blocked: Malware detected")]
    MalwareDetected { rules: Vec<String> },

    /// Persistence or relocation failed.
    #[error("Internal storage error")]
    StorageFault(#[from] StorageError),

    /// The pipeline task died before reaching a decision.
    #[error("Internal server error")]
    Interrupted,
}

impl PipelineError {
    /// Stable reason code written to the audit trail and metrics.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::MissingFilePart => "no_file_part",
            Self::EmptyFilename => "no_filename",
            Self::DisallowedExtension { .. } => "extension_not_allowed",
            Self::SizeExceeded { .. } => "size_exceeded",
            Self::MimeMismatch { .. } => "mime_mismatch",
            Self::MalwareDetected { .. } => "malware_detected",
            Self::StorageFault(_) => "storage_fault",
            Self::Interrupted => "pipeline_interrupted",
        }
    }

    /// Client-attributable failures map to 400; the rest are server faults.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::StorageFault(_) | Self::Interrupted)
    }
}
