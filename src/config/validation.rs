//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (every allowlisted extension has a MIME entry)
//! - Validate value ranges (limits > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatekeeperConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatekeeperConfig;
use crate::intake::sniff::UNKNOWN_MEDIA_TYPE;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("policy.allowed_extensions is empty")]
    EmptyAllowlist,

    #[error("extension {0:?} must be a bare suffix without dots or separators")]
    MalformedExtension(String),

    #[error("allowlisted extension {0:?} has no policy.mime_map entry")]
    MissingMimeEntry(String),

    #[error("policy.mime_map entry {0:?} permits no media types")]
    EmptyMimeEntry(String),

    #[error("policy.mime_map entry {0:?} permits the sentinel type \"unknown\"")]
    SentinelPermitted(String),

    #[error("limits.max_upload_bytes must be greater than zero")]
    ZeroUploadLimit,

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("storage.upload_dir and storage.quarantine_dir must differ")]
    SharedStorageDirectory,

    #[error("{field} is not a valid socket address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatekeeperConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let policy = &config.policy;

    if policy.allowed_extensions.is_empty() {
        errors.push(ValidationError::EmptyAllowlist);
    }

    for ext in &policy.allowed_extensions {
        if !is_bare_extension(ext) {
            errors.push(ValidationError::MalformedExtension(ext.clone()));
            continue;
        }
        let normalized = ext.to_lowercase();
        let mapped = policy
            .mime_map
            .keys()
            .any(|key| key.to_lowercase() == normalized);
        if !mapped {
            errors.push(ValidationError::MissingMimeEntry(ext.clone()));
        }
    }

    for (ext, types) in &policy.mime_map {
        if !is_bare_extension(ext) {
            errors.push(ValidationError::MalformedExtension(ext.clone()));
        }
        if types.is_empty() {
            errors.push(ValidationError::EmptyMimeEntry(ext.clone()));
        }
        if types.iter().any(|t| t.trim().eq_ignore_ascii_case(UNKNOWN_MEDIA_TYPE)) {
            errors.push(ValidationError::SentinelPermitted(ext.clone()));
        }
    }

    if config.limits.max_upload_bytes == 0 {
        errors.push(ValidationError::ZeroUploadLimit);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if Path::new(&config.storage.upload_dir) == Path::new(&config.storage.quarantine_dir) {
        errors.push(ValidationError::SharedStorageDirectory);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_bare_extension(ext: &str) -> bool {
    !ext.is_empty()
        && ext
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GatekeeperConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatekeeperConfig::default();
        config.policy.allowed_extensions.push("gif".into());
        config.policy.allowed_extensions.push("../x".into());
        config.policy.mime_map.insert("bin".into(), vec![]);
        config.limits.max_upload_bytes = 0;
        config.storage.quarantine_dir = config.storage.upload_dir.clone();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::MissingMimeEntry("gif".into())));
        assert!(errors.contains(&ValidationError::MalformedExtension("../x".into())));
        assert!(errors.contains(&ValidationError::EmptyMimeEntry("bin".into())));
        assert!(errors.contains(&ValidationError::ZeroUploadLimit));
        assert!(errors.contains(&ValidationError::SharedStorageDirectory));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn test_sentinel_cannot_be_permitted() {
        let mut config = GatekeeperConfig::default();
        config
            .policy
            .mime_map
            .insert("txt".into(), vec!["text/plain".into(), "unknown".into()]);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::SentinelPermitted("txt".into())]);
    }

    #[test]
    fn test_extension_case_is_normalized_for_lookup() {
        let mut config = GatekeeperConfig::default();
        config.policy.allowed_extensions = vec!["PDF".into()];
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_bad_bind_address() {
        let mut config = GatekeeperConfig::default();
        config.listener.bind_address = "localhost".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            errors.as_slice(),
            [ValidationError::InvalidAddress { field: "listener.bind_address", .. }]
        ));
    }
}
