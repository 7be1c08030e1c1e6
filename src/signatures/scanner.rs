//! Signature scanner.

use std::sync::Arc;

use super::rules::SignatureSet;

/// Outcome of scanning one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Matched rule identifiers, in rule declaration order.
    pub matched: Vec<String>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.matched.is_empty()
    }
}

/// Read-only scanner over the process-wide compiled rule set.
#[derive(Debug, Clone)]
pub struct SignatureScanner {
    rules: Arc<SignatureSet>,
}

impl SignatureScanner {
    pub fn new(rules: Arc<SignatureSet>) -> Self {
        Self { rules }
    }

    /// Scan `data` against every compiled rule. Never mutates the artifact.
    ///
    /// Cost is linear in `data.len()`, which the transport caps at the
    /// configured upload limit.
    pub fn scan(&self, data: &[u8]) -> ScanReport {
        ScanReport {
            matched: self.rules.matches(data),
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
