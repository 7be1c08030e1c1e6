//! Extension gate.

use super::error::PipelineError;
use super::policy::IntakePolicy;
use super::types::Extension;

/// Pass only when `filename` has a suffix after its last `.` that is on the
/// allowlist (case-insensitive). Pure; touches nothing.
pub fn check_extension(filename: &str, policy: &IntakePolicy) -> Result<Extension, PipelineError> {
    let Some((_, suffix)) = filename.rsplit_once('.') else {
        return Err(PipelineError::DisallowedExtension { extension: None });
    };

    let normalized = suffix.to_lowercase();
    if normalized.is_empty() || !policy.allows(&normalized) {
        return Err(PipelineError::DisallowedExtension {
            extension: Some(normalized),
        });
    }

    Ok(Extension::new(normalized))
}
