//! Storage layer for burrow-relay.
//!
//! Stages fallback payloads when peers cannot connect directly. Each
//! transfer gets its own directory keyed by transfer id, so purging a
//! transfer never touches another one.

mod fs;

pub use fs::FsPayloadStore;

use crate::error::StorageResult;
use async_trait::async_trait;
use burrow_types::TransferId;
use std::path::{Path, PathBuf};

/// Trait for fallback payload backends.
#[async_trait]
pub trait PayloadStore: Send + Sync + std::fmt::Debug {
    /// Stage a payload for a transfer.
    ///
    /// `filename` must already be sanitized. Returns the stored path.
    async fn stage(
        &self,
        transfer_id: &TransferId,
        filename: &str,
        payload: &[u8],
    ) -> StorageResult<PathBuf>;

    /// Read a staged payload back.
    ///
    /// Returns `None` if the file no longer exists.
    async fn load(&self, path: &Path) -> StorageResult<Option<Vec<u8>>>;

    /// Remove one staged payload, and its transfer directory once empty.
    ///
    /// Returns `true` if a file was removed.
    async fn purge(&self, path: &Path) -> StorageResult<bool>;
}

/// Reduce a client-supplied file name to a safe single path component.
///
/// Keeps ASCII letters, digits, `.`, `-` and `_`; whitespace becomes `_`;
/// directories and leading dots are stripped. Returns `None` if nothing
/// usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.').trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
