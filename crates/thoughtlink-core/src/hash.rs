//! Content hashing used for message identity and the shared-thought ledger.

use ring::digest::{digest, SHA256};
use std::fmt::Write;

/// Hex-encoded SHA-256 over the given parts, separated by a unit separator so
/// `["ab", "c"]` and `["a", "bc"]` hash differently.
pub fn content_hash(parts: &[&str]) -> String {
    let mut buf = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            buf.push(0x1f);
        }
        buf.extend_from_slice(part.as_bytes());
    }
    let d = digest(&SHA256, &buf);
    let mut out = String::with_capacity(64);
    for byte in d.as_ref() {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// Shortened hash for ids that end up in logs and on the wire.
pub fn short_hash(parts: &[&str]) -> String {
    content_hash(parts)[..16].to_string()
}

/// Collapse runs of whitespace so re-rendered text hashes identically.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
