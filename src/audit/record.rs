//! Audit record model and line format.
//!
//! One record renders as one line:
//!
//! ```text
//! 2026-10-19 14:02:11,517 | WARNING | BLOCKED | IP=203.0.113.9 | filename=image.png | stored=..._image.png | detected_mime=application/pdf | expected=[image/png] | reason=mime_mismatch
//! ```

use std::fmt;

use chrono::{DateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Severity of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditLevel {
    Info,
    Warning,
    Error,
}

impl AuditLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Allowed,
    Blocked,
    /// The verdict could not be carried out (storage failure).
    Fault,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allowed => "ALLOWED",
            Self::Blocked => "BLOCKED",
            Self::Fault => "FAULT",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable audit entry. Built once per terminal decision.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    timestamp: DateTime<Utc>,
    level: AuditLevel,
    action: AuditAction,
    fields: Vec<(&'static str, String)>,
}

impl AuditRecord {
    pub fn new(level: AuditLevel, action: AuditAction) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            action,
            fields: Vec::new(),
        }
    }

    /// Override the timestamp (records are otherwise stamped at creation).
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Append `key=value`. The value is escaped so it cannot break the line.
    pub fn field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.fields.push((key, escape(&value.to_string())));
        self
    }

    /// Append `key=[a, b, c]`.
    pub fn list_field<S: AsRef<str>>(mut self, key: &'static str, values: &[S]) -> Self {
        let items: Vec<String> = values.iter().map(|v| escape(v.as_ref())).collect();
        self.fields.push((key, format!("[{}]", items.join(", "))));
        self
    }

    /// Render as a single line without the trailing newline.
    pub fn render(&self) -> String {
        let mut line = format!(
            "{} | {} | {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.level,
            self.action
        );
        for (key, value) in &self.fields {
            line.push_str(" | ");
            line.push_str(key);
            line.push('=');
            line.push_str(value);
        }
        line
    }
}

/// Escape client-controlled text: no newlines, no bare field separators.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\|"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.extend(c.escape_default()),
            c => out.push(c),
        }
    }
    out
}
