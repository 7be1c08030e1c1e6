//! TLS configuration and certificate loading.

use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;

use crate::config::TlsConfig;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("Certificate file not found: {0}")]
    MissingCertificate(PathBuf),

    #[error("Private key file not found: {0}")]
    MissingKey(PathBuf),

    #[error("Failed to load TLS material: {0}")]
    Load(#[from] std::io::Error),
}

/// Load a rustls server config from the PEM files named in `config`.
pub async fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, TlsError> {
    let cert_path = Path::new(&config.cert_path);
    let key_path = Path::new(&config.key_path);

    if !cert_path.exists() {
        return Err(TlsError::MissingCertificate(cert_path.to_path_buf()));
    }
    if !key_path.exists() {
        return Err(TlsError::MissingKey(key_path.to_path_buf()));
    }

    Ok(RustlsConfig::from_pem_file(cert_path, key_path).await?)
}
