//! Content-type sniffing.
//!
//! Classification looks only at the bytes: magic signatures via `infer`,
//! then a plain-text heuristic. Filenames and client headers are ignored.

use super::types::MediaType;

/// Indeterminate classification. Never satisfies the consistency check.
pub const UNKNOWN_MEDIA_TYPE: &str = "unknown";

/// Zero-length content.
pub const EMPTY_MEDIA_TYPE: &str = "application/x-empty";

const TEXT_MEDIA_TYPE: &str = "text/plain";

/// Stateless content sniffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentSniffer;

impl ContentSniffer {
    pub fn new() -> Self {
        Self
    }

    /// Classify `data`. Never fails; returns `unknown` when indeterminate.
    pub fn sniff(&self, data: &[u8]) -> MediaType {
        if data.is_empty() {
            return MediaType::new(EMPTY_MEDIA_TYPE);
        }

        if let Some(kind) = infer::get(data) {
            return MediaType::new(kind.mime_type());
        }

        if looks_like_text(data) {
            return MediaType::new(TEXT_MEDIA_TYPE);
        }

        MediaType::unknown()
    }
}

/// UTF-8, BOM-marked UTF-16, or 8-bit extended ASCII (Latin-1,
/// Windows-1252), with no NUL and no control characters other than common
/// whitespace.
fn looks_like_text(data: &[u8]) -> bool {
    if let Some(units) = utf16_units(data) {
        return char::decode_utf16(units).all(|c| c.is_ok_and(is_text_char));
    }
    match std::str::from_utf8(data) {
        Ok(text) => text.chars().all(is_text_char),
        Err(_) => data.iter().all(|&b| b >= 0x80 || is_text_char(char::from(b))),
    }
}

fn is_text_char(c: char) -> bool {
    !c.is_control() || matches!(c, '\n' | '\r' | '\t' | '\u{0c}')
}

/// Code units after a UTF-16 byte-order mark, if `data` starts with one.
fn utf16_units(data: &[u8]) -> Option<impl Iterator<Item = u16> + '_> {
    let (body, little_endian) = match data {
        [0xFF, 0xFE, rest @ ..] => (rest, true),
        [0xFE, 0xFF, rest @ ..] => (rest, false),
        _ => return None,
    };
    if body.len() % 2 != 0 {
        return None;
    }
    Some(body.chunks_exact(2).map(move |pair| {
        let bytes = [pair[0], pair[1]];
        if little_endian {
            u16::from_le_bytes(bytes)
        } else {
            u16::from_be_bytes(bytes)
        }
    }))
}
