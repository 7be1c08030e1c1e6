//! Validated runtime form of the intake policy.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::config::PolicyConfig;

use super::types::{Extension, MediaType};

/// Extension allowlist and extension → permitted media types.
///
/// Built once at startup from a validated [`PolicyConfig`] and shared
/// read-only for the process lifetime.
#[derive(Debug, Clone)]
pub struct IntakePolicy {
    allowed: HashSet<String>,
    permitted: HashMap<String, BTreeSet<String>>,
}

impl IntakePolicy {
    pub fn from_config(config: &PolicyConfig) -> Self {
        let allowed = config
            .allowed_extensions
            .iter()
            .map(|ext| ext.to_lowercase())
            .collect();

        let mut permitted: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (ext, types) in &config.mime_map {
            permitted
                .entry(ext.to_lowercase())
                .or_default()
                .extend(types.iter().map(|t| t.to_lowercase()));
        }

        Self { allowed, permitted }
    }

    /// Is the lower-cased suffix on the allowlist?
    pub fn allows(&self, extension: &str) -> bool {
        self.allowed.contains(extension)
    }

    /// Media types permitted for `extension`, sorted.
    pub fn permitted_types(&self, extension: &Extension) -> Vec<String> {
        self.permitted
            .get(extension.as_str())
            .map(|types| types.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Does `media_type` satisfy `extension`? `unknown` never does.
    pub fn permits(&self, extension: &Extension, media_type: &MediaType) -> bool {
        if media_type.is_unknown() {
            return false;
        }
        self.permitted
            .get(extension.as_str())
            .is_some_and(|types| types.contains(&media_type.as_str().to_lowercase()))
    }
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self::from_config(&PolicyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = IntakePolicy::default();
        assert!(policy.allows("pdf"));
        assert!(policy.allows("txt"));
        assert!(!policy.allows("exe"));
        assert!(!policy.allows("PDF"));

        let png = Extension::new("png");
        assert!(policy.permits(&png, &MediaType::new("image/png")));
        assert!(!policy.permits(&png, &MediaType::new("application/pdf")));
        assert_eq!(policy.permitted_types(&png), vec!["image/png"]);
    }

    #[test]
    fn test_config_is_case_normalised() {
        let mut config = PolicyConfig::default();
        config.allowed_extensions = vec!["JPEG".into()];
        config.mime_map.insert("Jpeg".into(), vec!["Image/JPEG".into()]);

        let policy = IntakePolicy::from_config(&config);
        assert!(policy.allows("jpeg"));
        assert!(policy.permits(&Extension::new("jpeg"), &MediaType::new("image/jpeg")));
    }

    #[test]
    fn test_unknown_never_permitted() {
        let mut config = PolicyConfig::default();
        config.mime_map.insert("bin".into(), vec!["unknown".into()]);
        let policy = IntakePolicy::from_config(&config);
        assert!(!policy.permits(&Extension::new("bin"), &MediaType::unknown()));
    }
}
