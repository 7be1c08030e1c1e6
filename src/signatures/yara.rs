//! YARA rule sources, compiled with `yara-x`.

use std::fmt;

use yara_x::{Compiler, Rules, Scanner};

use super::rules::RuleError;

/// Reported when the engine fails mid-scan. Any report is a block, so a
/// scan that cannot finish never lets an artifact through.
pub const SCAN_FAILED_RULE: &str = "scan_failed";

/// A compiled YARA rule set.
pub struct YaraRules {
    rules: Rules,
    ids: Vec<String>,
}

impl YaraRules {
    pub fn compile(source: &str) -> Result<Self, RuleError> {
        let mut compiler = Compiler::new();
        compiler
            .add_source(source)
            .map_err(|e| RuleError::Yara(Box::new(e)))?;
        let rules = compiler.build();
        let ids = rules.iter().map(|rule| rule.identifier().to_string()).collect();
        Ok(Self { rules, ids })
    }

    /// Names of the matching rules, in declaration order.
    pub fn matches(&self, data: &[u8]) -> Vec<String> {
        let mut scanner = Scanner::new(&self.rules);
        match scanner.scan(data) {
            Ok(results) => results
                .matching_rules()
                .map(|rule| rule.identifier().to_string())
                .collect(),
            Err(e) => {
                tracing::error!(error = %e, "YARA scan failed");
                vec![SCAN_FAILED_RULE.to_string()]
            }
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

impl fmt::Debug for YaraRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YaraRules").field("ids", &self.ids).finish_non_exhaustive()
    }
}
