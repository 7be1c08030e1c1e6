//! Pipeline orchestrator.
//!
//! Sequences the gates over one upload, short-circuits on the first failure
//! and writes exactly one audit record for the terminal decision.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::audit::{AuditAction, AuditLevel, AuditLogger, AuditRecord};
use crate::observability::metrics;
use crate::signatures::{SignatureScanner, SignatureSet};
use crate::storage::{ArtifactStore, QuarantineManager, StorageName, StoredArtifact};

use super::consistency::check_consistency;
use super::error::PipelineError;
use super::extension::check_extension;
use super::identifier::{storage_name, IdGenerator, RngIdGenerator};
use super::policy::IntakePolicy;
use super::sniff::ContentSniffer;
use super::types::{
    AcceptedUpload, MediaType, Outcome, PipelineState, Stage, UploadRequest, ValidationVerdict,
};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// The upload validation pipeline.
///
/// Everything it holds is immutable after construction and shared across
/// concurrent requests.
pub struct Pipeline {
    policy: Arc<IntakePolicy>,
    store: Arc<dyn ArtifactStore>,
    quarantine: QuarantineManager,
    scanner: SignatureScanner,
    sniffer: ContentSniffer,
    ids: Arc<dyn IdGenerator>,
    audit: AuditLogger,
    max_upload_bytes: usize,
}

impl Pipeline {
    pub fn new(
        policy: Arc<IntakePolicy>,
        store: Arc<dyn ArtifactStore>,
        rules: Arc<SignatureSet>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            policy,
            quarantine: QuarantineManager::new(store.clone()),
            store,
            scanner: SignatureScanner::new(rules),
            sniffer: ContentSniffer::new(),
            ids: Arc::new(RngIdGenerator::from_entropy()),
            audit,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Replace the identifier source.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn rule_count(&self) -> usize {
        self.scanner.rule_count()
    }

    /// Run one upload through every gate.
    ///
    /// Returns the accepted artifact, or the error whose `Display` is the
    /// client-facing message.
    pub async fn run(&self, request: UploadRequest) -> Result<AcceptedUpload, PipelineError> {
        let start = Instant::now();
        let client = request.client_addr;
        let filename = request.file.as_ref().map(|f| f.filename.clone());
        if let Some(file) = &request.file {
            metrics::record_upload_bytes(file.len());
        }

        let (decision, reached) = self.decide(request).await;
        self.conclude(client, filename.as_deref(), decision, reached, start)
    }

    /// Run one upload on its own task.
    ///
    /// Once an artifact is on disk it must be checked, then kept or isolated,
    /// then audited. The detached task carries that through even when the
    /// caller is dropped by a timeout or a disconnect.
    pub async fn submit(self: Arc<Self>, request: UploadRequest) -> Result<AcceptedUpload, PipelineError> {
        let client = request.client_addr;
        let filename = request.file.as_ref().map(|f| f.filename.clone());

        let pipeline = Arc::clone(&self);
        match tokio::spawn(async move { pipeline.run(request).await }).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(client = %client, error = %e, "Pipeline task failed");
                let decision = Decision::fault(None, PipelineError::Interrupted, None);
                self.conclude(client, filename.as_deref(), decision, PipelineState::Received, Instant::now())
            }
        }
    }

    /// Audit a rejection the transport reached before the pipeline could
    /// run (an oversized or malformed body). Always returns `Err(error)`.
    pub fn refuse(
        &self,
        client: IpAddr,
        filename: Option<&str>,
        error: PipelineError,
    ) -> Result<AcceptedUpload, PipelineError> {
        let decision = Decision::rejected(Stage::Request, error);
        self.conclude(client, filename, decision, PipelineState::Received, Instant::now())
    }

    /// Walk the gates. Returns the decision and the furthest state reached.
    async fn decide(&self, request: UploadRequest) -> (Decision, PipelineState) {
        let mut state = PipelineState::Received;

        let Some(file) = request.file else {
            return (Decision::rejected(Stage::Request, PipelineError::MissingFilePart), state);
        };
        if file.filename.is_empty() {
            return (Decision::rejected(Stage::Request, PipelineError::EmptyFilename), state);
        }
        if file.len() > self.max_upload_bytes {
            let error = PipelineError::SizeExceeded {
                limit: self.max_upload_bytes,
                observed: Some(file.len() as u64),
            };
            return (Decision::rejected(Stage::Request, error), state);
        }

        let extension = match check_extension(&file.filename, &self.policy) {
            Ok(extension) => extension,
            Err(error) => return (Decision::rejected(Stage::Extension, error), state),
        };
        advance(&mut state);

        let name = storage_name(self.ids.as_ref(), &file.filename);
        let artifact = match self.store.persist(&name, file.data.clone()).await {
            Ok(artifact) => artifact,
            Err(e) => return (Decision::fault(None, e.into(), None), state),
        };
        advance(&mut state);

        // Content checks run on the stored bytes, not the request buffer
        let data = match self.store.read(&artifact).await {
            Ok(data) => data,
            Err(e) => return (Decision::fault(Some(name), e.into(), None), state),
        };

        let detected = self.sniffer.sniff(&data);
        if let Err(error) = check_consistency(&extension, &detected, &self.policy) {
            return (self.isolate(artifact, Stage::Mime, detected, error).await, state);
        }
        advance(&mut state);

        let report = self.scanner.scan(&data);
        if !report.is_clean() {
            let error = PipelineError::MalwareDetected {
                rules: report.matched,
            };
            return (self.isolate(artifact, Stage::Signature, detected, error).await, state);
        }
        advance(&mut state);

        let decision = Decision::Accepted {
            artifact: artifact.accept(),
            media_type: detected,
        };
        (decision, state)
    }

    async fn isolate(
        &self,
        artifact: StoredArtifact,
        stage: Stage,
        detected: MediaType,
        error: PipelineError,
    ) -> Decision {
        let name = artifact.name().clone();
        match self.quarantine.quarantine(artifact, error.reason_code()).await {
            Ok(artifact) => Decision::Quarantined {
                artifact,
                stage,
                detected,
                error,
            },
            Err(e) => Decision::fault(Some(name), e.into(), Some(error.reason_code())),
        }
    }

    fn conclude(
        &self,
        client: IpAddr,
        filename: Option<&str>,
        decision: Decision,
        reached: PipelineState,
        start: Instant,
    ) -> Result<AcceptedUpload, PipelineError> {
        let verdict = decision.verdict(reached);
        let record = decision.audit_record(client, filename);

        match verdict.outcome {
            Outcome::Accepted => tracing::info!(
                client = %client,
                stored = ?decision.stored_name().map(StorageName::as_str),
                mime = ?verdict.detected_type.as_ref().map(MediaType::as_str),
                reached = verdict.reached.as_str(),
                "Upload accepted"
            ),
            Outcome::Rejected | Outcome::Quarantined => tracing::warn!(
                client = %client,
                outcome = %verdict.outcome,
                stage = %verdict.stage,
                reached = verdict.reached.as_str(),
                detected = ?verdict.detected_type.as_ref().map(MediaType::as_str),
                expected = ?verdict.expected_types,
                rules = ?verdict.matched_rules,
                reason = verdict.reason,
                "Upload blocked"
            ),
            Outcome::Faulted => tracing::error!(
                client = %client,
                stage = %verdict.stage,
                reached = verdict.reached.as_str(),
                reason = verdict.reason,
                "Upload faulted"
            ),
        }

        if let Err(fault) = self.audit.record(&record) {
            tracing::error!(error = %fault.source, record = %fault.line, "Audit record lost");
            metrics::record_audit_failure();
        }

        metrics::record_decision(verdict.outcome.as_str(), verdict.stage.as_str(), start);
        decision.into_result()
    }
}

fn advance(state: &mut PipelineState) {
    if let Some(next) = state.next() {
        tracing::trace!(from = ?state, to = ?next, "Pipeline advanced");
        *state = next;
    }
}

/// A terminal decision, before it is reported.
#[derive(Debug)]
enum Decision {
    Accepted {
        artifact: StoredArtifact,
        media_type: MediaType,
    },
    Quarantined {
        artifact: StoredArtifact,
        stage: Stage,
        detected: MediaType,
        error: PipelineError,
    },
    Rejected {
        stage: Stage,
        error: PipelineError,
    },
    Faulted {
        stored: Option<StorageName>,
        error: PipelineError,
        /// Block reason that could not be carried out, if any.
        blocked: Option<&'static str>,
    },
}

impl Decision {
    fn rejected(stage: Stage, error: PipelineError) -> Self {
        Self::Rejected { stage, error }
    }

    fn fault(stored: Option<StorageName>, error: PipelineError, blocked: Option<&'static str>) -> Self {
        Self::Faulted { stored, error, blocked }
    }

    fn stored_name(&self) -> Option<&StorageName> {
        match self {
            Self::Accepted { artifact, .. } | Self::Quarantined { artifact, .. } => Some(artifact.name()),
            Self::Faulted { stored, .. } => stored.as_ref(),
            Self::Rejected { .. } => None,
        }
    }

    fn verdict(&self, reached: PipelineState) -> ValidationVerdict {
        match self {
            Self::Accepted { media_type, .. } => ValidationVerdict {
                stage: Stage::Complete,
                reached,
                outcome: Outcome::Accepted,
                reason: self.reason(),
                detected_type: Some(media_type.clone()),
                expected_types: Vec::new(),
                matched_rules: Vec::new(),
            },
            Self::Quarantined {
                stage,
                detected,
                error,
                ..
            } => {
                let (expected_types, matched_rules) = match error {
                    PipelineError::MimeMismatch { expected, .. } => (expected.clone(), Vec::new()),
                    PipelineError::MalwareDetected { rules } => (Vec::new(), rules.clone()),
                    _ => (Vec::new(), Vec::new()),
                };
                ValidationVerdict {
                    stage: *stage,
                    reached,
                    outcome: Outcome::Quarantined,
                    reason: error.reason_code(),
                    detected_type: Some(detected.clone()),
                    expected_types,
                    matched_rules,
                }
            }
            Self::Rejected { stage, error } => ValidationVerdict {
                stage: *stage,
                reached,
                outcome: Outcome::Rejected,
                reason: error.reason_code(),
                detected_type: None,
                expected_types: Vec::new(),
                matched_rules: Vec::new(),
            },
            Self::Faulted { error, .. } => ValidationVerdict {
                stage: Stage::Storage,
                reached,
                outcome: Outcome::Faulted,
                reason: error.reason_code(),
                detected_type: None,
                expected_types: Vec::new(),
                matched_rules: Vec::new(),
            },
        }
    }

    fn audit_record(&self, client: IpAddr, filename: Option<&str>) -> AuditRecord {
        let (level, action) = match self {
            Self::Accepted { .. } => (AuditLevel::Info, AuditAction::Allowed),
            Self::Quarantined {
                error: PipelineError::MalwareDetected { .. },
                ..
            } => (AuditLevel::Error, AuditAction::Blocked),
            Self::Quarantined { .. } | Self::Rejected { .. } => (AuditLevel::Warning, AuditAction::Blocked),
            Self::Faulted { .. } => (AuditLevel::Error, AuditAction::Fault),
        };

        let mut record = AuditRecord::new(level, action).field("IP", client);
        if let Some(filename) = filename.filter(|f| !f.is_empty()) {
            record = record.field("filename", filename);
        }
        if let Some(stored) = self.stored_name() {
            record = record.field("stored", stored);
        }

        let record = match self {
            Self::Accepted { media_type, .. } => record.field("mime", media_type),
            Self::Quarantined { detected, error, .. } => {
                describe(record.field("detected_mime", detected), error).field("quarantined", true)
            }
            Self::Rejected { error, .. } => describe(record, error),
            Self::Faulted { error, blocked, .. } => {
                let record = describe(record, error);
                match blocked {
                    Some(reason) => record.field("blocked_for", reason),
                    None => record,
                }
            }
        };
        record.field("reason", self.reason())
    }

    fn reason(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "all_checks_passed",
            Self::Quarantined { error, .. } | Self::Rejected { error, .. } | Self::Faulted { error, .. } => {
                error.reason_code()
            }
        }
    }

    fn into_result(self) -> Result<AcceptedUpload, PipelineError> {
        match self {
            Self::Accepted { artifact, media_type } => Ok(AcceptedUpload {
                stored_name: artifact.name().to_string(),
                media_type,
            }),
            Self::Quarantined { error, .. } | Self::Rejected { error, .. } | Self::Faulted { error, .. } => {
                Err(error)
            }
        }
    }
}

/// Audit detail carried by an error. Never shown to the client.
fn describe(record: AuditRecord, error: &PipelineError) -> AuditRecord {
    match error {
        PipelineError::DisallowedExtension {
            extension: Some(extension),
        } => record.field("extension", extension),
        PipelineError::SizeExceeded { limit, observed } => {
            let record = record.field("limit", limit);
            match observed {
                Some(observed) => record.field("observed", observed),
                None => record,
            }
        }
        PipelineError::MimeMismatch { expected, .. } => record.list_field("expected", expected.as_slice()),
        PipelineError::MalwareDetected { rules } => record.list_field("rules", rules.as_slice()),
        PipelineError::StorageFault(e) => record.field("error", e),
        _ => record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::sink::{BrokenAuditSink, MemoryAuditSink};
    use crate::audit::AuditSink;
    use crate::intake::types::FilePart;
    use crate::storage::{LocalArtifactStore, StorageError, StorageResult};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use tempfile::TempDir;

    const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n";
    const RULES: &str = "[[rule]]\nid = \"Test_Marker\"\nstrings = [\"MALICIOUS-MARKER\"]\n";

    struct Harness {
        dir: TempDir,
        sink: Arc<MemoryAuditSink>,
        pipeline: Pipeline,
    }

    impl Harness {
        async fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let store = LocalArtifactStore::open(dir.path().join("uploads"), dir.path().join("quarantine"))
                .await
                .unwrap();
            let sink = Arc::new(MemoryAuditSink::default());
            let pipeline = pipeline_with(Arc::new(store), sink.clone());
            Self { dir, sink, pipeline }
        }

        fn working(&self) -> Vec<String> {
            list(&self.dir.path().join("uploads"))
        }

        fn quarantined(&self) -> Vec<String> {
            list(&self.dir.path().join("quarantine"))
        }
    }

    fn pipeline_with(store: Arc<dyn ArtifactStore>, sink: Arc<dyn AuditSink>) -> Pipeline {
        Pipeline::new(
            Arc::new(IntakePolicy::default()),
            store,
            Arc::new(SignatureSet::from_toml(RULES).unwrap()),
            AuditLogger::new(sink),
        )
        .with_id_generator(Arc::new(RngIdGenerator::seeded(3)))
        .with_max_upload_bytes(1024)
    }

    fn list(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn upload(filename: &str, data: &[u8]) -> UploadRequest {
        UploadRequest {
            client_addr: IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9)),
            file: Some(FilePart::new(filename, data.to_vec())),
        }
    }

    #[tokio::test]
    async fn test_valid_pdf_accepted() {
        let h = Harness::new().await;

        let accepted = h.pipeline.run(upload("report.pdf", PDF)).await.unwrap();
        assert_eq!(accepted.media_type.as_str(), "application/pdf");
        assert!(accepted.stored_name.ends_with("_report.pdf"));
        assert_eq!(h.working(), vec![accepted.stored_name.clone()]);
        assert!(h.quarantined().is_empty());

        let lines = h.sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" | INFO | ALLOWED | IP=203.0.113.9 | filename=report.pdf"));
        assert!(lines[0].contains(&format!("stored={}", accepted.stored_name)));
        assert!(lines[0].ends_with("mime=application/pdf | reason=all_checks_passed"));
    }

    #[tokio::test]
    async fn test_spoofed_png_quarantined() {
        let h = Harness::new().await;

        let err = h.pipeline.run(upload("image.png", PDF)).await.unwrap_err();
        assert!(matches!(err, PipelineError::MimeMismatch { .. }));
        assert_eq!(err.to_string(), "Blocked: MIME mismatch");

        assert!(h.working().is_empty());
        let quarantined = h.quarantined();
        assert_eq!(quarantined.len(), 1);
        assert_eq!(
            std::fs::read(h.dir.path().join("quarantine").join(&quarantined[0])).unwrap(),
            PDF
        );

        let lines = h.sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" | WARNING | BLOCKED | IP=203.0.113.9"));
        assert!(lines[0].contains("detected_mime=application/pdf | expected=[image/png]"));
        assert!(lines[0].ends_with("reason=mime_mismatch"));
    }

    #[tokio::test]
    async fn test_signature_match_quarantined_at_error_level() {
        let h = Harness::new().await;
        let content = b"harmless looking notes\nMALICIOUS-MARKER\n";

        let err = h.pipeline.run(upload("doc.txt", content)).await.unwrap_err();
        match &err {
            PipelineError::MalwareDetected { rules } => assert_eq!(rules, &vec!["Test_Marker".to_string()]),
            other => panic!("unexpected {other:?}"),
        }

        assert!(h.working().is_empty());
        let quarantined = h.quarantined();
        assert_eq!(quarantined.len(), 1);
        assert_eq!(
            std::fs::read(h.dir.path().join("quarantine").join(&quarantined[0])).unwrap(),
            content
        );

        let lines = h.sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" | ERROR | BLOCKED | "));
        assert!(lines[0].contains("rules=[Test_Marker]"));
        assert!(lines[0].ends_with("reason=malware_detected"));
    }

    #[tokio::test]
    async fn test_disallowed_extension_persists_nothing() {
        let h = Harness::new().await;

        let err = h.pipeline.run(upload("notes.exe", b"MZ")).await.unwrap_err();
        assert_eq!(err.to_string(), "File extension not allowed");
        assert!(h.working().is_empty());
        assert!(h.quarantined().is_empty());

        let lines = h.sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(!lines[0].contains("stored="));
        assert!(lines[0].contains("filename=notes.exe | extension=exe | reason=extension_not_allowed"));
    }

    #[tokio::test]
    async fn test_missing_part_and_empty_filename() {
        let h = Harness::new().await;

        let missing = UploadRequest {
            client_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            file: None,
        };
        let err = h.pipeline.run(missing).await.unwrap_err();
        assert_eq!(err.to_string(), "No file part");

        let err = h.pipeline.run(upload("", b"data")).await.unwrap_err();
        assert_eq!(err.to_string(), "No selected file");

        let lines = h.sink.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("| WARNING | BLOCKED | IP=127.0.0.1 | reason=no_file_part"));
        assert!(lines[1].ends_with("| WARNING | BLOCKED | IP=203.0.113.9 | reason=no_filename"));
        assert!(h.working().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected_before_persistence() {
        let h = Harness::new().await;

        let err = h.pipeline.run(upload("big.txt", &[b'a'; 2048])).await.unwrap_err();
        assert!(matches!(err, PipelineError::SizeExceeded { limit: 1024, observed: Some(2048) }));
        assert!(h.working().is_empty());
        assert!(h.sink.lines()[0].contains("limit=1024 | observed=2048 | reason=size_exceeded"));
    }

    #[tokio::test]
    async fn test_refuse_is_audited() {
        let h = Harness::new().await;

        let result = h.pipeline.refuse(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            None,
            PipelineError::SizeExceeded { limit: 1024, observed: None },
        );
        assert!(matches!(result, Err(PipelineError::SizeExceeded { .. })));

        let lines = h.sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("IP=127.0.0.1 | limit=1024 | reason=size_exceeded"));
    }

    #[tokio::test]
    async fn test_empty_file_never_accepted() {
        let h = Harness::new().await;

        let err = h.pipeline.run(upload("empty.txt", b"")).await.unwrap_err();
        assert!(matches!(err, PipelineError::MimeMismatch { .. }));
        assert_eq!(h.quarantined().len(), 1);
    }

    #[tokio::test]
    async fn test_audit_failure_keeps_verdict() {
        let dir = TempDir::new().unwrap();
        let store = LocalArtifactStore::open(dir.path().join("u"), dir.path().join("q"))
            .await
            .unwrap();
        let pipeline = pipeline_with(Arc::new(store), Arc::new(BrokenAuditSink));

        let accepted = pipeline.run(upload("report.pdf", PDF)).await.unwrap();
        assert_eq!(accepted.media_type.as_str(), "application/pdf");

        let err = pipeline.run(upload("image.png", PDF)).await.unwrap_err();
        assert!(matches!(err, PipelineError::MimeMismatch { .. }));
        assert_eq!(list(&dir.path().join("q")).len(), 1);
    }

    struct FailingStore;

    #[async_trait]
    impl ArtifactStore for FailingStore {
        async fn persist(&self, _name: &StorageName, _data: Bytes) -> StorageResult<StoredArtifact> {
            Err(StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        }

        async fn read(&self, artifact: &StoredArtifact) -> StorageResult<Vec<u8>> {
            Err(StorageError::NotFound(artifact.name().to_string()))
        }

        async fn relocate_to_quarantine(&self, artifact: &StoredArtifact) -> StorageResult<()> {
            Err(StorageError::NotFound(artifact.name().to_string()))
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_fault() {
        let sink = Arc::new(MemoryAuditSink::default());
        let pipeline = pipeline_with(Arc::new(FailingStore), sink.clone());

        let err = pipeline.run(upload("report.pdf", PDF)).await.unwrap_err();
        assert!(!err.is_client_error());
        assert_eq!(err.to_string(), "Internal storage error");

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" | ERROR | FAULT | "));
        assert!(lines[0].contains("error=I/O error: disk full"));
        assert!(lines[0].ends_with("reason=storage_fault"));
    }

    #[tokio::test]
    async fn test_concurrent_uploads_of_same_name() {
        let h = Arc::new(Harness::new().await);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let h = h.clone();
                tokio::spawn(async move { h.pipeline.run(upload("same.pdf", PDF)).await.unwrap() })
            })
            .collect();

        let mut names = Vec::new();
        for handle in handles {
            names.push(handle.await.unwrap().stored_name);
        }
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 16);
        assert_eq!(h.working().len(), 16);
        assert_eq!(h.sink.lines().len(), 16);
    }

    #[tokio::test]
    async fn test_furthest_state_matches_outcome() {
        let h = Harness::new().await;

        let (decision, reached) = h.pipeline.decide(upload("report.pdf", PDF)).await;
        assert!(matches!(decision, Decision::Accepted { .. }));
        assert_eq!(reached, PipelineState::SignatureScanned);

        let (decision, reached) = h.pipeline.decide(upload("notes.exe", b"MZ")).await;
        assert!(matches!(decision, Decision::Rejected { .. }));
        assert_eq!(reached, PipelineState::Received);

        let (decision, reached) = h.pipeline.decide(upload("image.png", PDF)).await;
        assert!(matches!(decision, Decision::Quarantined { stage: Stage::Mime, .. }));
        assert_eq!(reached, PipelineState::Stored);

        let (decision, reached) = h.pipeline.decide(upload("doc.txt", b"MALICIOUS-MARKER")).await;
        assert!(matches!(decision, Decision::Quarantined { stage: Stage::Signature, .. }));
        assert_eq!(reached, PipelineState::MimeChecked);
        assert_eq!(decision.verdict(reached).reached, PipelineState::MimeChecked);
    }

    /// Delays every write so a caller can give up while it is in flight.
    struct SlowStore {
        inner: LocalArtifactStore,
        delay: Duration,
    }

    #[async_trait]
    impl ArtifactStore for SlowStore {
        async fn persist(&self, name: &StorageName, data: Bytes) -> StorageResult<StoredArtifact> {
            tokio::time::sleep(self.delay).await;
            self.inner.persist(name, data).await
        }

        async fn read(&self, artifact: &StoredArtifact) -> StorageResult<Vec<u8>> {
            self.inner.read(artifact).await
        }

        async fn relocate_to_quarantine(&self, artifact: &StoredArtifact) -> StorageResult<()> {
            self.inner.relocate_to_quarantine(artifact).await
        }
    }

    #[tokio::test]
    async fn test_abandoned_submission_still_isolated_and_audited() {
        let dir = TempDir::new().unwrap();
        let inner = LocalArtifactStore::open(dir.path().join("uploads"), dir.path().join("quarantine"))
            .await
            .unwrap();
        let store = SlowStore {
            inner,
            delay: Duration::from_millis(50),
        };
        let sink = Arc::new(MemoryAuditSink::default());
        let pipeline = Arc::new(pipeline_with(Arc::new(store), sink.clone()));

        let submitted = tokio::time::timeout(
            Duration::from_millis(10),
            pipeline.clone().submit(upload("image.png", PDF)),
        )
        .await;
        assert!(submitted.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(list(&dir.path().join("uploads")).is_empty());
        assert_eq!(list(&dir.path().join("quarantine")).len(), 1);
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("reason=mime_mismatch"));
    }

    #[tokio::test]
    async fn test_abandoned_submissions_never_leave_unchecked_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = LocalArtifactStore::open(dir.path().join("uploads"), dir.path().join("quarantine"))
            .await
            .unwrap();
        let sink = Arc::new(MemoryAuditSink::default());
        let pipeline = Arc::new(
            pipeline_with(Arc::new(store), sink.clone()).with_max_upload_bytes(8 * 1024 * 1024),
        );

        let mut spoofed = PDF.to_vec();
        spoofed.resize(4 * 1024 * 1024, b' ');

        for i in 0..30u64 {
            let _ = tokio::time::timeout(
                Duration::from_micros(500 * (i + 1)),
                pipeline.clone().submit(upload("image.png", &spoofed)),
            )
            .await;
        }

        // Wait for every detached run to conclude
        for _ in 0..100 {
            if sink.lines().len() == 30 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        assert_eq!(sink.lines().len(), 30);
        assert!(list(&dir.path().join("uploads")).is_empty());
        assert_eq!(list(&dir.path().join("quarantine")).len(), 30);
    }
}
