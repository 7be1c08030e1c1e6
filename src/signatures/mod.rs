//! Malicious-content signature subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     rules file (.yar via yara.rs, or TOML)
//!     → rules.rs (parse, validate ids/patterns, compile one RegexSet or YARA rules)
//!     → Arc<SignatureSet> (immutable for the process lifetime)
//!
//! Per upload:
//!     stored bytes → scanner.rs → ScanReport { matched rule ids }
//! ```
//!
//! # Design Decisions
//! - Compiled exactly once; never recompiled per request
//! - Single pass per artifact regardless of rule count
//! - A rule file that fails to compile aborts startup

pub mod rules;
pub mod scanner;
pub mod yara;

pub use rules::{Condition, RuleDefinition, RuleError, SignatureSet};
pub use scanner::{ScanReport, SignatureScanner};
