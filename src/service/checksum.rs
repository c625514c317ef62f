use sha2::{Digest, Sha256};

use crate::models::cache::{Verification, VerificationStatus};

/// A cached success younger than this skips the remote fetch entirely.
pub const FRESHNESS_WINDOW_MS: i64 = 5 * 60 * 1000;

/// SHA-256 hex digest of the raw content.
pub fn hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Change detection works on the normalized form: trim every line, drop
/// blanks, join with '\n'. Integrity verification hashes the raw bytes;
/// the two are deliberately different questions.
pub fn normalize(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn content_changed(local: &str, remote: &str) -> bool {
    normalize(local) != normalize(remote)
}

/// Compares what we wrote against what the remote now holds.
pub fn verify(local: &str, remote: &str, now_ms: i64) -> Verification {
    let local_hash = hash(local);
    if local_hash == hash(remote) {
        Verification {
            checksum: local_hash,
            last_verified: now_ms,
            status: VerificationStatus::Success,
            error: None,
        }
    } else {
        Verification {
            checksum: local_hash,
            last_verified: now_ms,
            status: VerificationStatus::Failed,
            error: Some("remote checksum does not match written content".to_string()),
        }
    }
}

/// True when a prior verification is recent enough, and its checksum still
/// matches the content we are about to write, to skip a remote round-trip.
pub fn is_fresh(verification: &Verification, content: &str, now_ms: i64) -> bool {
    verification.is_success()
        && now_ms - verification.last_verified < FRESHNESS_WINDOW_MS
        && verification.checksum == hash(content)
}
