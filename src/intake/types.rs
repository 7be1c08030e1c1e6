//! Intake data model.

use std::fmt;
use std::net::IpAddr;

use bytes::Bytes;

use super::sniff::UNKNOWN_MEDIA_TYPE;

/// One upload as received from the transport. Immutable once built.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Originating address, used for audit attribution only.
    pub client_addr: IpAddr,

    /// The file field, if the form carried one.
    pub file: Option<FilePart>,
}

/// The file field of an upload form.
#[derive(Debug, Clone)]
pub struct FilePart {
    /// Client-declared filename. Untrusted.
    pub filename: String,

    /// Raw bytes, already bounded by the transport's upload cap.
    pub data: Bytes,
}

impl FilePart {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }

    /// Observed byte length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A lower-cased, allowlisted filename suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Extension(String);

impl Extension {
    pub(crate) fn new(ext: impl Into<String>) -> Self {
        Self(ext.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A media type derived from content inspection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType(String);

impl MediaType {
    pub fn new(mime: impl Into<String>) -> Self {
        Self(mime.into())
    }

    /// The indeterminate classification. Never permitted for any extension.
    pub fn unknown() -> Self {
        Self(UNKNOWN_MEDIA_TYPE.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_MEDIA_TYPE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pipeline progress. Transitions are strictly linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineState {
    Received,
    ExtensionChecked,
    Stored,
    MimeChecked,
    SignatureScanned,
}

impl PipelineState {
    /// The state that follows this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::ExtensionChecked),
            Self::ExtensionChecked => Some(Self::Stored),
            Self::Stored => Some(Self::MimeChecked),
            Self::MimeChecked => Some(Self::SignatureScanned),
            Self::SignatureScanned => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::ExtensionChecked => "extension_checked",
            Self::Stored => "stored",
            Self::MimeChecked => "mime_checked",
            Self::SignatureScanned => "signature_scanned",
        }
    }
}

/// The check that produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Request,
    Extension,
    Storage,
    Mime,
    Signature,
    /// Every check passed.
    Complete,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Extension => "extension",
            Self::Storage => "storage",
            Self::Mime => "mime",
            Self::Signature => "signature",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Quarantined,
    Rejected,
    /// A server-side fault prevented the verdict from being carried out.
    Faulted,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Quarantined => "quarantined",
            Self::Rejected => "rejected",
            Self::Faulted => "faulted",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The decision reached for one upload, with everything the audit trail needs.
///
/// Never sent to the client; only `PipelineError`'s generic message is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationVerdict {
    pub stage: Stage,
    /// Furthest pipeline state reached before the decision.
    pub reached: PipelineState,
    pub outcome: Outcome,
    pub reason: &'static str,
    pub detected_type: Option<MediaType>,
    pub expected_types: Vec<String>,
    pub matched_rules: Vec<String>,
}

/// Reply for an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedUpload {
    /// Generated storage name; the only identifier the client learns.
    pub stored_name: String,
    pub media_type: MediaType,
}
