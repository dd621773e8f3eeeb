//! Content hasher
//!
//! The identifier of a photo is derived from its bytes only:
//!
//! 1. base64-encode the whole file,
//! 2. reduce the encoding to `len + first 5 + 30 around the midpoint + last 15`,
//! 3. hash the reduction into a name-based (v5) UUID under the nil namespace.
//!
//! This is not a cryptographic digest. It only has to be deterministic and
//! practically collision-free for photo libraries.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use photolake_core::domain::ContentHash;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{Result, SyncError};

const HEAD_LEN: usize = 5;
const MIDDLE_HALF_WIDTH: usize = 15;
const TAIL_LEN: usize = 15;

/// Hashes an in-memory buffer
#[must_use]
pub fn hash_bytes(content: &[u8]) -> ContentHash {
    let encoded = STANDARD.encode(content);
    let reduced = fuzzy_reduce(&encoded);
    ContentHash::from_uuid(Uuid::new_v5(&Uuid::nil(), reduced.as_bytes()))
}

/// Reads the whole file at `path` and hashes its content
///
/// # Errors
/// Returns `SyncError::Hash` if the file cannot be opened or read.
#[instrument(level = "debug", fields(path = %path.display()))]
pub async fn hash_file(path: &Path) -> Result<ContentHash> {
    let content = tokio::fs::read(path).await.map_err(|source| SyncError::Hash {
        path: path.to_path_buf(),
        source,
    })?;
    let hash = tokio::task::spawn_blocking(move || hash_bytes(&content))
        .await
        .map_err(|e| SyncError::Hash {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?;
    debug!(%hash, "hashed");
    Ok(hash)
}

/// Sampling reduction of a base64 string
///
/// Slices are clamped so inputs shorter than 30 characters are still
/// reduced without panicking; for longer inputs the result is the plain
/// `len + s[..5] + s[mid-15..mid+15] + s[len-15..]` concatenation.
fn fuzzy_reduce(encoded: &str) -> String {
    let n = encoded.len();
    let mid = n / 2;
    let head = &encoded[..n.min(HEAD_LEN)];
    let middle = &encoded[mid.saturating_sub(MIDDLE_HALF_WIDTH)..(mid + MIDDLE_HALF_WIDTH).min(n)];
    let tail = &encoded[n.saturating_sub(TAIL_LEN)..];
    format!("{n}{head}{middle}{tail}")
}
