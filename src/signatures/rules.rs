//! Signature rule definitions and compilation.
//!
//! Two rule sources are accepted, chosen by file extension:
//! - `.yar` / `.yara`: YARA rules, compiled by `yara-x`
//! - anything else: the TOML pattern format below
//!
//!
//! ```toml
//! [[rule]]
//! id = "EICAR_Test_File"
//! description = "EICAR anti-malware test string"
//! strings = ['X5O!P%@AP[4\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*']
//!
//! [[rule]]
//! id = "PE_Dropper"
//! condition = "all"
//! hex = ["4D 5A 90 00"]
//! strings = ["This program cannot be run in DOS mode"]
//! ```
//!
//! Every pattern of every TOML rule goes into one `RegexSet`, so a scan is a
//! single pass over the artifact regardless of rule count.

use std::collections::HashSet;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use regex::bytes::{RegexBuilder, RegexSet, RegexSetBuilder};
use serde::Deserialize;
use thiserror::Error;

use super::yara::YaraRules;

/// Errors raised while loading or compiling a rule source.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("failed to read rules from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rules: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate rule id {0:?}")]
    DuplicateId(String),

    #[error("rule {0:?} has no id")]
    MissingId(usize),

    #[error("rule {0:?} defines no patterns")]
    EmptyRule(String),

    #[error("rule {rule:?}: invalid hex pattern {pattern:?}")]
    InvalidHex { rule: String, pattern: String },

    #[error("rule {rule:?}: invalid pattern: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to compile rule set: {0}")]
    Compile(#[from] regex::Error),

    #[error("failed to compile YARA rules: {0}")]
    Yara(Box<yara_x::errors::CompileError>),
}

/// How a rule combines its patterns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// Any single pattern matching is enough.
    #[default]
    Any,
    /// Every pattern must match somewhere in the artifact.
    All,
}

/// A rule as written in the rule file.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleDefinition {
    pub id: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub condition: Condition,

    /// Literal text patterns.
    #[serde(default)]
    pub strings: Vec<String>,

    /// Hex byte patterns, e.g. `"4D 5A 90 00"`.
    #[serde(default)]
    pub hex: Vec<String>,

    /// Byte regular expressions.
    #[serde(default)]
    pub regex: Vec<String>,

    /// Match `strings` case-insensitively.
    #[serde(default)]
    pub nocase: bool,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default, rename = "rule")]
    rules: Vec<RuleDefinition>,
}

#[derive(Debug)]
struct CompiledRule {
    id: String,
    condition: Condition,
    patterns: Range<usize>,
}

/// Immutable, compiled signature set. Build once, share via `Arc`.
#[derive(Debug)]
pub struct SignatureSet {
    engine: Engine,
}

#[derive(Debug)]
enum Engine {
    Patterns { set: RegexSet, rules: Vec<CompiledRule> },
    Yara(YaraRules),
}

impl SignatureSet {
    /// Load and compile the rule file at `path`.
    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let source = fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if is_yara_source(path) {
            Self::from_yara(&source)
        } else {
            Self::from_toml(&source)
        }
    }

    /// Compile rules from TOML source text.
    pub fn from_toml(source: &str) -> Result<Self, RuleError> {
        let file: RuleFile = toml::from_str(source)?;
        Self::compile(&file.rules)
    }

    /// Compile YARA source text. Matches report the YARA rule names.
    pub fn from_yara(source: &str) -> Result<Self, RuleError> {
        Ok(Self {
            engine: Engine::Yara(YaraRules::compile(source)?),
        })
    }

    /// Compile rule definitions into a single-pass matcher.
    pub fn compile(definitions: &[RuleDefinition]) -> Result<Self, RuleError> {
        let mut seen = HashSet::new();
        let mut patterns: Vec<String> = Vec::new();
        let mut rules = Vec::with_capacity(definitions.len());

        for (index, def) in definitions.iter().enumerate() {
            let id = def.id.trim();
            if id.is_empty() {
                return Err(RuleError::MissingId(index));
            }
            if !seen.insert(id.to_string()) {
                return Err(RuleError::DuplicateId(id.to_string()));
            }

            let start = patterns.len();

            for literal in &def.strings {
                let escaped = regex::escape(literal);
                patterns.push(if def.nocase {
                    format!("(?i){escaped}")
                } else {
                    escaped
                });
            }

            for hex in &def.hex {
                let bytes = parse_hex(hex).ok_or_else(|| RuleError::InvalidHex {
                    rule: id.to_string(),
                    pattern: hex.clone(),
                })?;
                patterns.push(hex_pattern(&bytes));
            }

            for expr in &def.regex {
                // Compile alone first so errors name the offending rule
                RegexBuilder::new(expr)
                    .build()
                    .map_err(|source| RuleError::InvalidPattern {
                        rule: id.to_string(),
                        source,
                    })?;
                patterns.push(expr.clone());
            }

            if patterns.len() == start {
                return Err(RuleError::EmptyRule(id.to_string()));
            }

            rules.push(CompiledRule {
                id: id.to_string(),
                condition: def.condition,
                patterns: start..patterns.len(),
            });
        }

        let set = RegexSetBuilder::new(&patterns).build()?;
        Ok(Self {
            engine: Engine::Patterns { set, rules },
        })
    }

    /// Identifiers of every rule matching `data`, in declaration order.
    pub fn matches(&self, data: &[u8]) -> Vec<String> {
        match &self.engine {
            Engine::Patterns { rules, .. } if rules.is_empty() => Vec::new(),
            Engine::Patterns { set, rules } => {
                let hits = set.matches(data);
                rules
                    .iter()
                    .filter(|rule| match rule.condition {
                        Condition::Any => rule.patterns.clone().any(|i| hits.matched(i)),
                        Condition::All => rule.patterns.clone().all(|i| hits.matched(i)),
                    })
                    .map(|rule| rule.id.clone())
                    .collect()
            }
            Engine::Yara(yara) => yara.matches(data),
        }
    }

    pub fn len(&self) -> usize {
        match &self.engine {
            Engine::Patterns { rules, .. } => rules.len(),
            Engine::Yara(yara) => yara.ids().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rule_ids(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match &self.engine {
            Engine::Patterns { rules, .. } => Box::new(rules.iter().map(|r| r.id.as_str())),
            Engine::Yara(yara) => Box::new(yara.ids().iter().map(String::as_str)),
        }
    }
}

fn is_yara_source(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yar") || ext.eq_ignore_ascii_case("yara"))
}

fn parse_hex(pattern: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = pattern.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(text, 16).ok()
        })
        .collect()
}

fn hex_pattern(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("(?-u:\\x{b:02X})")).collect()
}
