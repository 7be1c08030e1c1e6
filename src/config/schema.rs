//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gatekeeper.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the upload gatekeeper.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatekeeperConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Upload size limits enforced at the transport boundary.
    pub limits: LimitsConfig,

    /// Extension allowlist and extension → media type mapping.
    pub policy: PolicyConfig,

    /// Working and quarantine directories.
    pub storage: StorageConfig,

    /// Malicious-content signature rules.
    pub signatures: SignatureConfig,

    /// Audit trail destination.
    pub audit: AuditConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Upload size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_upload_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024, // 10MiB
        }
    }
}

/// Which uploads may even be attempted, and what their content must look like.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Filename suffixes permitted to attempt upload (without the dot).
    pub allowed_extensions: Vec<String>,

    /// Extension → media types the sniffed content may have.
    pub mime_map: BTreeMap<String, Vec<String>>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        let mime_map = [
            ("pdf", "application/pdf"),
            ("jpg", "image/jpeg"),
            ("png", "image/png"),
            ("txt", "text/plain"),
        ]
        .into_iter()
        .map(|(ext, mime)| (ext.to_string(), vec![mime.to_string()]))
        .collect();

        Self {
            allowed_extensions: ["jpg", "png", "pdf", "txt"]
                .into_iter()
                .map(String::from)
                .collect(),
            mime_map,
        }
    }
}

/// Artifact storage locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Working directory for pending and accepted artifacts.
    pub upload_dir: String,

    /// Isolated directory for quarantined artifacts.
    pub quarantine_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: "uploads".to_string(),
            quarantine_dir: "quarantine".to_string(),
        }
    }
}

/// Signature rule source.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Path to the TOML rule file, compiled once at startup.
    pub rules_path: String,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            rules_path: "rules/malware.yar".to_string(),
        }
    }
}

/// Audit trail destination.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Append-only security log file.
    pub log_path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_path: "logs/security.log".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit operational logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
