//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;

use upload_gatekeeper::config::GatekeeperConfig;
use upload_gatekeeper::http::HttpServer;
use upload_gatekeeper::lifecycle::{bootstrap, Shutdown};

pub const TEST_RULES: &str = r#"
[[rule]]
id = "EICAR_Test_File"
strings = ['X5O!P%@AP[4\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*']

[[rule]]
id = "Test_Marker"
strings = ["MALICIOUS-MARKER"]
"#;

pub const EICAR: &[u8] = b"X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

pub const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\n";

pub const PNG: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00,
];

/// A gatekeeper running on an ephemeral port inside a temporary directory.
pub struct TestServer {
    pub addr: SocketAddr,
    pub dir: TempDir,
    pub client: reqwest::Client,
    shutdown: Shutdown,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(customize: impl FnOnce(&mut GatekeeperConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        let rules_path = dir.path().join("rules.toml");
        std::fs::write(&rules_path, TEST_RULES).unwrap();

        let mut config = GatekeeperConfig::default();
        config.listener.bind_address = "127.0.0.1:0".to_string();
        config.signatures.rules_path = path_string(&rules_path);
        config.storage.upload_dir = path_string(&dir.path().join("uploads"));
        config.storage.quarantine_dir = path_string(&dir.path().join("quarantine"));
        config.audit.log_path = path_string(&dir.path().join("logs").join("security.log"));
        customize(&mut config);

        let pipeline = bootstrap(&config).await.unwrap();
        let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let shutdown = Shutdown::new();
        let server = HttpServer::new(config, pipeline);
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            server.run(listener, rx).await.unwrap();
        });

        Self {
            addr,
            dir,
            client: reqwest::Client::new(),
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// POST `data` as the `file` field, claiming `filename`.
    pub async fn upload(&self, filename: &str, data: &[u8]) -> (StatusCode, Value) {
        let form = Form::new().part("file", Part::bytes(data.to_vec()).file_name(filename.to_string()));
        self.post_form(form).await
    }

    pub async fn post_form(&self, form: Form) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap())
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    pub fn quarantine_dir(&self) -> PathBuf {
        self.dir.path().join("quarantine")
    }

    pub fn working_files(&self) -> Vec<String> {
        list(&self.uploads_dir())
    }

    pub fn quarantined_files(&self) -> Vec<String> {
        list(&self.quarantine_dir())
    }

    /// Audit lines once the background writer has caught up.
    pub async fn audit_lines(&self) -> Vec<String> {
        let mut last = self.read_audit();
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(25)).await;
            let current = self.read_audit();
            if !current.is_empty() && current == last {
                return current;
            }
            last = current;
        }
        last
    }

    fn read_audit(&self) -> Vec<String> {
        let path = self.dir.path().join("logs").join("security.log");
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

fn path_string(path: &Path) -> String {
    path.display().to_string()
}

fn list(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
