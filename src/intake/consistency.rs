//! MIME consistency check.

use super::error::PipelineError;
use super::policy::IntakePolicy;
use super::types::{Extension, MediaType};

/// Pass only when `detected` is permitted for `extension`.
pub fn check_consistency(
    extension: &Extension,
    detected: &MediaType,
    policy: &IntakePolicy,
) -> Result<(), PipelineError> {
    if policy.permits(extension, detected) {
        return Ok(());
    }

    Err(PipelineError::MimeMismatch {
        detected: detected.clone(),
        expected: policy.permitted_types(extension),
    })
}
