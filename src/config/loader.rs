//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatekeeperConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value:?}")]
    Env { key: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<GatekeeperConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatekeeperConfig = toml::from_str(&content)?;
    finish(config)
}

/// Load from `path` when given, otherwise start from built-in defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<GatekeeperConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => finish(GatekeeperConfig::default()),
    }
}

fn finish(mut config: GatekeeperConfig) -> Result<GatekeeperConfig, ConfigError> {
    apply_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply `GATEKEEPER_*` overrides using `lookup` to resolve variables.
pub fn apply_overrides<F>(config: &mut GatekeeperConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("GATEKEEPER_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = lookup("GATEKEEPER_MAX_UPLOAD_BYTES") {
        config.limits.max_upload_bytes = v.trim().parse().map_err(|_| ConfigError::Env {
            key: "GATEKEEPER_MAX_UPLOAD_BYTES",
            value: v.clone(),
        })?;
    }
    if let Some(v) = lookup("GATEKEEPER_UPLOAD_DIR") {
        config.storage.upload_dir = v;
    }
    if let Some(v) = lookup("GATEKEEPER_QUARANTINE_DIR") {
        config.storage.quarantine_dir = v;
    }
    if let Some(v) = lookup("GATEKEEPER_RULES_PATH") {
        config.signatures.rules_path = v;
    }
    if let Some(v) = lookup("GATEKEEPER_AUDIT_LOG") {
        config.audit.log_path = v;
    }
    if let Some(v) = lookup("GATEKEEPER_LOG_LEVEL") {
        config.observability.log_level = v;
    }
    Ok(())
}
