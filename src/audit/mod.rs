//! Security audit trail.
//!
//! # Data Flow
//! ```text
//! Pipeline decision
//!     → record.rs (AuditRecord: level, action, escaped fields)
//!     → AuditLogger::record (render one line)
//!     → sink.rs (queued to a writer thread, appended one line at a time)
//! ```
//!
//! # Design Decisions
//! - Exactly one record per terminal decision, written by the pipeline
//! - A failed append never changes the client-visible outcome; it is
//!   surfaced as a `LoggingFault` for operator alerting
//! - The audit file is separate from the diagnostic `tracing` output

pub mod record;
pub mod sink;

use std::io;
use std::sync::Arc;

use thiserror::Error;

pub use record::{AuditAction, AuditLevel, AuditRecord};
pub use sink::{AuditSink, FileAuditSink};

/// The audit trail could not be written.
#[derive(Debug, Error)]
#[error("failed to append audit record: {source}")]
pub struct LoggingFault {
    #[source]
    pub source: io::Error,
    /// The line that was lost, for the diagnostic log.
    pub line: String,
}

/// Writes audit records to a sink.
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Append one record.
    pub fn record(&self, record: &AuditRecord) -> Result<(), LoggingFault> {
        let line = record.render();
        self.sink
            .append(&line)
            .map_err(|source| LoggingFault { source, line })
    }
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger").finish_non_exhaustive()
    }
}
