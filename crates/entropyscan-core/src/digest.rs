//! Streaming MD5, SHA-1, SHA-256 and SHA-512 in a single read pass.

use std::path::Path;

use md5::{Digest as _, Md5};
use ring::digest::{Context, SHA1_FOR_LEGACY_USE_ONLY, SHA256, SHA512};
use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::target;

/// Lowercase hex digests of one file's full contents.
///
/// All four fields are empty for a zero-length file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestSet {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
    pub sha512: String,
}

impl DigestSet {
    /// True when no digest was produced (zero-length input).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.md5.is_empty() && self.sha1.is_empty() && self.sha256.is_empty() && self.sha512.is_empty()
    }
}

/// Four independent accumulators fed from the same buffer.
pub struct MultiHasher {
    md5: Md5,
    sha1: Context,
    sha256: Context,
    sha512: Context,
}

impl Default for MultiHasher {
    fn default() -> Self {
        Self {
            md5: Md5::new(),
            sha1: Context::new(&SHA1_FOR_LEGACY_USE_ONLY),
            sha256: Context::new(&SHA256),
            sha512: Context::new(&SHA512),
        }
    }
}

impl MultiHasher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.md5.update(data);
        self.sha1.update(data);
        self.sha256.update(data);
        self.sha512.update(data);
    }

    #[must_use]
    pub fn finish(self) -> DigestSet {
        DigestSet {
            md5: hex::encode(self.md5.finalize()),
            sha1: hex::encode(self.sha1.finish()),
            sha256: hex::encode(self.sha256.finish()),
            sha512: hex::encode(self.sha512.finish()),
        }
    }
}

/// Hash an in-memory buffer. Empty input yields the standard empty-input
/// digests.
#[must_use]
pub fn digest_bytes(data: &[u8]) -> DigestSet {
    let mut hasher = MultiHasher::new();
    hasher.update(data);
    hasher.finish()
}

/// Hash the file at `path` in one streaming pass.
///
/// Same preconditions as entropy: regular file, at most
/// [`target::MAX_FILE_SIZE`] bytes. A zero-length file is not hashed and
/// yields an empty [`DigestSet`].
pub async fn file_digests(path: &Path, chunk_size: usize, cancel: &CancellationToken) -> Result<DigestSet> {
    let opened = target::open_regular(path).await?;
    if opened.size == 0 {
        return Ok(DigestSet::default());
    }

    let mut hasher = MultiHasher::new();
    target::stream_chunks(path, opened, chunk_size, cancel, |chunk| hasher.update(chunk)).await?;

    Ok(hasher.finish())
}
