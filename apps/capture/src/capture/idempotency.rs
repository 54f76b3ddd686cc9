use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::models::JobApplicationDraft;

/// How a save call is keyed for server-side deduplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdempotencyPolicy {
    /// No key; resubmitting a draft stores a duplicate.
    None,
    /// SHA-256 over the tab URL and the extracted draft, computed before the
    /// capture timestamp is attached. Capturing the same page content again
    /// yields the same key.
    #[default]
    ContentHash,
}

impl IdempotencyPolicy {
    pub fn key_for(&self, url: &str, draft: &JobApplicationDraft) -> Option<String> {
        match self {
            IdempotencyPolicy::None => None,
            IdempotencyPolicy::ContentHash => {
                let mut hasher = Sha256::new();
                hasher.update(url.as_bytes());
                hasher.update([0u8]);
                hasher.update(draft.canonical_json().as_bytes());
                Some(format!("{:x}", hasher.finalize()))
            }
        }
    }
}

impl FromStr for IdempotencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(IdempotencyPolicy::None),
            "content-hash" | "content_hash" => Ok(IdempotencyPolicy::ContentHash),
            other => Err(format!(
                "unknown idempotency policy '{other}' (expected 'content-hash' or 'none')"
            )),
        }
    }
}
