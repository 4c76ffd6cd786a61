// SPDX-License-Identifier: AGPL-3.0-or-later

//! Content-addressed identity assignment for scrolls.
//!
//! Every upload is fingerprinted by hashing its normalized content bytes. The full fingerprint
//! (`content_hash`, 64 hex characters) deduplicates byte-identical uploads, a short prefix of it
//! (`url_hash`, 12 to 20 characters) becomes the public path segment. Hashing is pure and
//! deterministic over the content only, metadata never influences the identity.
use sha2::{Digest, Sha256};

use crate::db::errors::ScrollStorageError;
use crate::db::SqlStore;

/// Number of characters the public url hash starts out with.
pub const URL_HASH_MIN_LEN: usize = 12;

/// Upper bound for url hash extension, matches the column width.
pub const URL_HASH_MAX_LEN: usize = 20;

/// Normalizes all line endings to Unix format (LF only).
///
/// Browsers and editors disagree about line endings, so CRLF and bare CR both map to LF before
/// hashing. Without this the "same" document would produce different fingerprints depending on
/// the authors operating system.
pub fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

/// Returns the SHA-256 fingerprint of normalized content as a lowercase hex string.
pub fn content_hash(normalized: &str) -> String {
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(digest)
}

/// Derives the url hash prefix of given length from a full content hash.
pub fn url_hash_prefix(content_hash: &str, length: usize) -> &str {
    &content_hash[..length.min(content_hash.len())]
}

/// Resolves a unique url hash for new content against the store.
///
/// Starts with a 12 character prefix and extends one character at a time when the prefix is
/// already taken by *different* content. Identical content is normally detected as a duplicate
/// before this point, a concurrent upload of the same bytes simply reuses the existing prefix
/// here.
pub async fn resolve_url_hash(
    store: &SqlStore,
    full_hash: &str,
) -> Result<String, ScrollStorageError> {
    for length in URL_HASH_MIN_LEN..=URL_HASH_MAX_LEN {
        let candidate = url_hash_prefix(full_hash, length);

        match store.get_scroll_by_url_hash(candidate).await? {
            None => return Ok(candidate.to_string()),
            Some(existing) if existing.content_hash.as_deref() == Some(full_hash) => {
                return Ok(candidate.to_string())
            }
            // Different content claimed this prefix, try a longer one.
            Some(_) => continue,
        }
    }

    // With SHA-256 a 20 character collision between different documents is not a realistic
    // situation, but the loop needs an end.
    Err(ScrollStorageError::UrlHashExhausted(full_hash.to_string()))
}
