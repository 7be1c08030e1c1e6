//! Storage name generation.
//!
//! A storage name is `<uuid>_<sanitized client filename>`. The random part
//! comes from an injected [`IdGenerator`] so tests can make it deterministic.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use uuid::{Builder, Uuid};

use crate::storage::StorageName;

const MAX_SANITIZED_LEN: usize = 128;
const FALLBACK_NAME: &str = "upload";

/// Source of statistically unique tokens.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Uuid;
}

/// Random v4 identifiers drawn from a shared RNG.
#[derive(Debug)]
pub struct RngIdGenerator<R> {
    rng: Mutex<R>,
}

impl<R: RngCore + Send> RngIdGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng: Mutex::new(rng) }
    }
}

impl RngIdGenerator<StdRng> {
    /// Seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Deterministic sequence, for tests.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: RngCore + Send> IdGenerator for RngIdGenerator<R> {
    fn next_id(&self) -> Uuid {
        let mut bytes = [0u8; 16];
        // A poisoned lock still holds a usable RNG
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.fill_bytes(&mut bytes);
        Builder::from_random_bytes(bytes).into_uuid()
    }
}

/// Reduce an untrusted filename to a safe single path component.
///
/// Directory parts are dropped, anything outside `[A-Za-z0-9._-]` becomes
/// `_`, dot runs collapse to one dot and leading/trailing dots and
/// underscores are trimmed. Never fails; falls back to `upload`.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();

    let mut out = String::with_capacity(base.len());
    for c in base.chars() {
        let mapped = if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
            c
        } else {
            '_'
        };
        if mapped == '.' && out.ends_with('.') {
            continue;
        }
        out.push(mapped);
    }

    let trimmed = out.trim_matches(|c: char| c == '.' || c == '_');
    let mut name = trimmed.to_string();

    if name.len() > MAX_SANITIZED_LEN {
        name = truncate_keeping_extension(&name);
    }

    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name
    }
}

fn truncate_keeping_extension(name: &str) -> String {
    // ASCII only at this point, so byte slicing is safe
    match name.rsplit_once('.') {
        Some((stem, ext)) if ext.len() + 1 < MAX_SANITIZED_LEN => {
            let keep = MAX_SANITIZED_LEN - ext.len() - 1;
            let stem = stem[..keep.min(stem.len())].trim_end_matches(|c: char| c == '.' || c == '_');
            format!("{stem}.{ext}")
        }
        _ => name[..MAX_SANITIZED_LEN].to_string(),
    }
}

/// Generate the storage name for an upload claiming `filename`.
pub fn storage_name(ids: &dyn IdGenerator, filename: &str) -> StorageName {
    StorageName::new(format!("{}_{}", ids.next_id().simple(), sanitize_filename(filename)))
}
