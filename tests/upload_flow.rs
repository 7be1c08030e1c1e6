//! End-to-end upload scenarios over HTTP.

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;
use common::{TestServer, EICAR, PDF, PNG};

#[tokio::test]
async fn test_valid_pdf_accepted() {
    let server = TestServer::start().await;

    let (status, body) = server.upload("report.pdf", PDF).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "File uploaded successfully");
    assert_eq!(body["mime_type"], "application/pdf");

    let stored = body["filename"].as_str().unwrap();
    assert!(stored.ends_with("_report.pdf"));
    assert_eq!(server.working_files(), vec![stored.to_string()]);
    assert!(server.quarantined_files().is_empty());
    assert_eq!(std::fs::read(server.uploads_dir().join(stored)).unwrap(), PDF);

    let audit = server.audit_lines().await;
    assert_eq!(audit.len(), 1);
    assert!(audit[0].contains(" | INFO | ALLOWED | IP=127.0.0.1 | filename=report.pdf"));
    assert!(audit[0].contains(&format!("stored={stored}")));
}

#[tokio::test]
async fn test_valid_png_accepted() {
    let server = TestServer::start().await;

    let (status, body) = server.upload("photo.PNG", PNG).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mime_type"], "image/png");
}

#[tokio::test]
async fn test_pdf_disguised_as_png_quarantined() {
    let server = TestServer::start().await;

    let (status, body) = server.upload("image.png", PDF).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Blocked: MIME mismatch" }));

    assert!(server.working_files().is_empty());
    let quarantined = server.quarantined_files();
    assert_eq!(quarantined.len(), 1);
    assert!(quarantined[0].ends_with("_image.png"));
    assert_eq!(std::fs::read(server.quarantine_dir().join(&quarantined[0])).unwrap(), PDF);

    let audit = server.audit_lines().await;
    assert_eq!(audit.len(), 1);
    assert!(audit[0].contains(" | WARNING | BLOCKED | IP=127.0.0.1 | filename=image.png"));
    assert!(audit[0].contains(&format!("stored={}", quarantined[0])));
    assert!(audit[0].contains("detected_mime=application/pdf | expected=[image/png]"));
    assert!(audit[0].ends_with("reason=mime_mismatch"));
}

#[tokio::test]
async fn test_executable_extension_rejected() {
    let server = TestServer::start().await;

    let (status, body) = server.upload("notes.exe", b"MZ\x90\x00").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "File extension not allowed" }));

    assert!(server.working_files().is_empty());
    assert!(server.quarantined_files().is_empty());

    let audit = server.audit_lines().await;
    assert_eq!(audit.len(), 1);
    assert!(audit[0].contains("filename=notes.exe"));
    assert!(!audit[0].contains("stored="));
    assert!(audit[0].ends_with("reason=extension_not_allowed"));
}

#[tokio::test]
async fn test_malware_text_quarantined() {
    let server = TestServer::start().await;

    let (status, body) = server.upload("doc.txt", EICAR).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Blocked: Malware detected" }));

    assert!(server.working_files().is_empty());
    let quarantined = server.quarantined_files();
    assert_eq!(quarantined.len(), 1);
    assert_eq!(std::fs::read(server.quarantine_dir().join(&quarantined[0])).unwrap(), EICAR);

    let audit = server.audit_lines().await;
    assert_eq!(audit.len(), 1);
    assert!(audit[0].contains(" | ERROR | BLOCKED | "));
    assert!(audit[0].contains("rules=[EICAR_Test_File]"));
    assert!(audit[0].ends_with("reason=malware_detected"));
}

#[tokio::test]
async fn test_empty_filename_rejected() {
    let server = TestServer::start().await;

    let form = Form::new().part("file", Part::bytes(b"content".to_vec()).file_name(""));
    let (status, body) = server.post_form(form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No selected file" }));

    let audit = server.audit_lines().await;
    assert_eq!(audit.len(), 1);
    assert!(audit[0].ends_with("| WARNING | BLOCKED | IP=127.0.0.1 | reason=no_filename"));
    assert!(server.working_files().is_empty());
}

#[tokio::test]
async fn test_missing_file_part_rejected() {
    let server = TestServer::start().await;

    let form = Form::new().text("comment", "no file here");
    let (status, body) = server.post_form(form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No file part" }));

    let res = server
        .client
        .post(server.url("/upload"))
        .body("not a form")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let audit = server.audit_lines().await;
    assert_eq!(audit.len(), 2);
    assert!(audit.iter().all(|line| line.ends_with("reason=no_file_part")));
}

#[tokio::test]
async fn test_file_over_limit_rejected() {
    let server = TestServer::start_with(|config| config.limits.max_upload_bytes = 1024).await;

    let (status, body) = server.upload("big.txt", &[b'a'; 4096]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "File too large" }));
    assert!(server.working_files().is_empty());

    let audit = server.audit_lines().await;
    assert_eq!(audit.len(), 1);
    assert!(audit[0].ends_with("reason=size_exceeded"));
}

#[tokio::test]
async fn test_declared_length_over_limit_refused_before_body() {
    let server = TestServer::start_with(|config| config.limits.max_upload_bytes = 1024).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    let head = "POST /upload HTTP/1.1\r\n\
                Host: localhost\r\n\
                Content-Type: multipart/form-data; boundary=XYZ\r\n\
                Content-Length: 104857600\r\n\
                Connection: close\r\n\r\n";
    stream.write_all(head.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 400"));
    assert!(response.contains(r#"{"error":"File too large"}"#));

    let audit = server.audit_lines().await;
    assert_eq!(audit.len(), 1);
    assert!(audit[0].contains("observed=104857600"));
    assert!(audit[0].ends_with("reason=size_exceeded"));
}

#[tokio::test]
async fn test_index_and_health() {
    let server = TestServer::start().await;

    let res = server.client.get(server.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let html = res.text().await.unwrap();
    assert!(html.contains(r#"name="file""#));

    let health: serde_json::Value = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["rules"], 2);
}

#[tokio::test]
async fn test_client_request_id_echoed() {
    let server = TestServer::start().await;

    let res = server
        .client
        .get(server.url("/health"))
        .header("x-request-id", "trace-me-42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-me-42");
}

#[tokio::test]
async fn test_shipped_yara_rules_block_by_rule_name() {
    let server = TestServer::start_with(|config| {
        config.signatures.rules_path = concat!(env!("CARGO_MANIFEST_DIR"), "/rules/malware.yar").to_string();
    })
    .await;

    let (status, body) = server.upload("doc.txt", EICAR).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Blocked: Malware detected" }));

    let (status, _) = server.upload("report.pdf", PDF).await;
    assert_eq!(status, StatusCode::OK);

    let audit = server.audit_lines().await;
    assert_eq!(audit.len(), 2);
    assert!(audit[0].contains("rules=[EICAR_Test_File]"));
    assert!(audit[1].contains(" | INFO | ALLOWED | "));
}

#[tokio::test]
async fn test_legacy_encoded_text_accepted() {
    let server = TestServer::start().await;

    let (status, body) = server.upload("menu.txt", b"Caf\xe9 cr\xe8me\n").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mime_type"], "text/plain");

    let mut utf16 = vec![0xFF, 0xFE];
    for unit in "Grüße\n".encode_utf16() {
        utf16.extend_from_slice(&unit.to_le_bytes());
    }
    let (status, body) = server.upload("greeting.txt", &utf16).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mime_type"], "text/plain");
}
