//! Audit sinks.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
#[cfg(test)]
use std::sync::Mutex;

use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Lines held in memory while the writer thread catches up.
pub const DEFAULT_BUFFERED_LINES: usize = 128_000;

/// Durable, append-only destination for rendered audit lines.
///
/// Implementations must write each line whole; concurrent appends may be
/// ordered arbitrarily but never interleave.
pub trait AuditSink: Send + Sync {
    fn append(&self, line: &str) -> io::Result<()>;
}

/// Append-only audit file behind a dedicated writer thread.
///
/// `append` only queues the line, so a slow disk never stalls a request.
/// When the queue is full the line is dropped and `append` reports it.
pub struct FileAuditSink {
    writer: NonBlocking,
    dropped_seen: AtomicUsize,
    _guard: WorkerGuard,
}

impl FileAuditSink {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file_name = path.file_name().ok_or_else(|| {
            io::Error::new(ErrorKind::InvalidInput, format!("{} has no file name", path.display()))
        })?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(file_name.to_string_lossy().into_owned())
            .build(dir)
            .map_err(|e| io::Error::new(ErrorKind::Other, e))?;

        Ok(Self::from_writer(appender, DEFAULT_BUFFERED_LINES))
    }

    pub(crate) fn from_writer<W>(writer: W, buffered_lines: usize) -> Self
    where
        W: Write + Send + 'static,
    {
        let (writer, guard) = NonBlockingBuilder::default()
            .lossy(true)
            .buffered_lines_limit(buffered_lines)
            .thread_name("audit-writer")
            .finish(writer);
        Self {
            writer,
            dropped_seen: AtomicUsize::new(0),
            _guard: guard,
        }
    }
}

impl AuditSink for FileAuditSink {
    fn append(&self, line: &str) -> io::Result<()> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        // One write is one queued message
        let mut writer = self.writer.clone();
        writer.write_all(&buf)?;

        let dropped = self.writer.error_counter().dropped_lines();
        let seen = self.dropped_seen.fetch_max(dropped, Ordering::Relaxed);
        if dropped > seen {
            return Err(io::Error::new(
                ErrorKind::WouldBlock,
                format!("audit queue full, {} line(s) dropped", dropped - seen),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for FileAuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAuditSink")
            .field("dropped", &self.dropped_seen.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// In-memory sink for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryAuditSink {
    lines: Mutex<Vec<String>>,
}

#[cfg(test)]
impl MemoryAuditSink {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl AuditSink for MemoryAuditSink {
    fn append(&self, line: &str) -> io::Result<()> {
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }
}

/// Sink that always fails, for exercising the logging-fault path.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct BrokenAuditSink;

#[cfg(test)]
impl AuditSink for BrokenAuditSink {
    fn append(&self, _line: &str) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "disk full"))
    }
}
