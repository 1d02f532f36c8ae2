//! SHA-256 file digests and pinned-digest comparison.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestVerdict {
    Matches,
    Mismatch { actual: String },
    FileMissing,
}

/// Hex-encoded SHA-256 of the file's exact bytes.
pub fn file_sha256(path: &Path) -> Result<String> {
    let contents = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(sha256_hex(&contents))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Compare the file's current digest with `expected` (case-insensitive).
///
/// The file is re-read on every call.
pub fn verify(path: &Path, expected: &str) -> Result<DigestVerdict> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(DigestVerdict::FileMissing),
        Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
    };
    let actual = sha256_hex(&contents);
    if actual == normalize_digest(expected) {
        Ok(DigestVerdict::Matches)
    } else {
        Ok(DigestVerdict::Mismatch { actual })
    }
}

pub fn normalize_digest(digest: &str) -> String {
    digest.trim().to_ascii_lowercase()
}

pub fn validate_digest(digest: &str) -> Result<()> {
    let digest = digest.trim();
    if digest.len() != DIGEST_HEX_LEN || !digest.chars().all(|ch| ch.is_ascii_hexdigit()) {
        bail!("digest must be {DIGEST_HEX_LEN} hex characters, got {digest:?}");
    }
    Ok(())
}
