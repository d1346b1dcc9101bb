//! Per-target classification: signature, then entropy, then digests.
//!
//! Each step is more expensive than the one before it, so each one only runs
//! when the previous result says the target is still interesting:
//!
//! ```text
//! is_elf (4 bytes) -> [elf_only && !elf: stop]
//!   -> entropy (full read) -> [entropy < threshold: stop]
//!     -> digests (full read)
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::cancel::CancellationToken;
use crate::digest::{self, DigestSet};
use crate::entropy::{self, MAX_ENTROPY};
use crate::error::{Result, ScanError};
use crate::signature;
use crate::target::{self, DEFAULT_CHUNK_SIZE};

/// Which targets to analyze and which to hash.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanPolicy {
    /// Skip entropy and digests for anything that is not ELF.
    pub elf_only: bool,
    /// Minimum entropy (inclusive) for a target to be hashed and reported.
    pub entropy_threshold: f64,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            elf_only: false,
            entropy_threshold: 0.0,
        }
    }
}

impl ScanPolicy {
    /// Build a policy, rejecting thresholds outside `[0.0, 8.0]`.
    pub fn new(elf_only: bool, entropy_threshold: f64) -> Result<Self> {
        if !(0.0..=MAX_ENTROPY).contains(&entropy_threshold) {
            return Err(ScanError::InvalidPolicy(format!(
                "entropy threshold {entropy_threshold} is outside 0.0 - {MAX_ENTROPY:.1}"
            )));
        }
        Ok(Self {
            elf_only,
            entropy_threshold,
        })
    }

    /// Copy of this policy restricted to ELF targets.
    #[must_use]
    pub const fn elf_only(self) -> Self {
        Self {
            elf_only: true,
            ..self
        }
    }

    /// The one threshold test. Gates hashing here and display in the
    /// reporting layer; both must go through this so hashes never go
    /// missing from printed records.
    #[must_use]
    pub fn meets_threshold(&self, entropy: Option<f64>) -> bool {
        entropy.is_some_and(|e| e >= self.entropy_threshold)
    }
}

/// Everything learned about one target. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    /// Final path component, bytes as on disk.
    pub name: OsString,
    pub path: PathBuf,
    pub is_elf: bool,
    /// `None` when the policy skipped entropy.
    pub entropy: Option<f64>,
    /// `None` when the policy skipped hashing.
    pub digests: Option<DigestSet>,
}

impl ClassificationRecord {
    /// Whether the reporting layer should print this record.
    #[must_use]
    pub fn is_reportable(&self, policy: &ScanPolicy) -> bool {
        policy.meets_threshold(self.entropy)
    }
}

/// The three primitives the classifier is built from.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// ELF magic check on the first four bytes.
    async fn is_elf(&self, path: &Path) -> Result<bool>;

    /// Rounded Shannon entropy of the whole file.
    async fn entropy(&self, path: &Path) -> Result<f64>;

    /// MD5/SHA-1/SHA-256/SHA-512 of the whole file.
    async fn digests(&self, path: &Path) -> Result<DigestSet>;
}

/// [`Analyzer`] backed by the local filesystem.
#[derive(Debug, Clone)]
pub struct FsAnalyzer {
    chunk_size: usize,
    cancel: CancellationToken,
}

impl Default for FsAnalyzer {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl FsAnalyzer {
    #[must_use]
    pub const fn new(cancel: CancellationToken) -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            cancel,
        }
    }

    /// Override the read size used for streaming passes.
    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[async_trait]
impl Analyzer for FsAnalyzer {
    async fn is_elf(&self, path: &Path) -> Result<bool> {
        signature::is_elf(path).await
    }

    async fn entropy(&self, path: &Path) -> Result<f64> {
        entropy::file_entropy(path, self.chunk_size, &self.cancel).await
    }

    async fn digests(&self, path: &Path) -> Result<DigestSet> {
        digest::file_digests(path, self.chunk_size, &self.cancel).await
    }
}

/// Classify a single target under `policy`.
///
/// Errors are returned untouched; deciding whether one is worth aborting a
/// sweep over is the caller's job (see [`crate::sweep`]).
pub async fn classify<A>(path: &Path, policy: &ScanPolicy, analyzer: &A) -> Result<ClassificationRecord>
where
    A: Analyzer + ?Sized,
{
    let is_elf = analyzer.is_elf(path).await?;

    let entropy = if policy.elf_only && !is_elf {
        trace!(path = %path.display(), "not ELF, skipping");
        None
    } else {
        Some(analyzer.entropy(path).await?)
    };

    let digests = if policy.meets_threshold(entropy) {
        Some(analyzer.digests(path).await?)
    } else {
        None
    };

    Ok(ClassificationRecord {
        name: target::file_name(path),
        path: path.to_path_buf(),
        is_elf,
        entropy,
        digests,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned answers plus a count of every call made.
    struct Scripted {
        elf: bool,
        entropy: f64,
        calls: AtomicUsize,
        entropy_calls: AtomicUsize,
        digest_calls: AtomicUsize,
    }

    impl Scripted {
        fn new(elf: bool, entropy: f64) -> Self {
            Self {
                elf,
                entropy,
                calls: AtomicUsize::new(0),
                entropy_calls: AtomicUsize::new(0),
                digest_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Analyzer for Scripted {
        async fn is_elf(&self, _path: &Path) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.elf)
        }

        async fn entropy(&self, _path: &Path) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entropy_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.entropy)
        }

        async fn digests(&self, _path: &Path) -> Result<DigestSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.digest_calls.fetch_add(1, Ordering::SeqCst);
            Ok(digest::digest_bytes(b"x"))
        }
    }

    fn policy(elf_only: bool, threshold: f64) -> ScanPolicy {
        ScanPolicy::new(elf_only, threshold).unwrap()
    }

    #[tokio::test]
    async fn elf_only_skips_non_elf_after_one_read() {
        let analyzer = Scripted::new(false, 7.9);
        let record = classify(Path::new("/tmp/notes.txt"), &policy(true, 0.0), &analyzer)
            .await
            .unwrap();

        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
        assert!(!record.is_elf);
        assert_eq!(record.entropy, None);
        assert_eq!(record.digests, None);
        assert_eq!(record.name, "notes.txt");
    }

    #[tokio::test]
    async fn non_elf_is_analyzed_without_elf_filter() {
        let analyzer = Scripted::new(false, 3.5);
        let record = classify(Path::new("/tmp/a"), &policy(false, 0.0), &analyzer)
            .await
            .unwrap();

        assert_eq!(record.entropy, Some(3.5));
        assert!(record.digests.is_some());
    }

    #[tokio::test]
    async fn threshold_is_inclusive() {
        let analyzer = Scripted::new(true, 7.25);
        let record = classify(Path::new("/bin/x"), &policy(true, 7.25), &analyzer)
            .await
            .unwrap();
        assert!(record.digests.is_some());
        assert!(record.is_reportable(&policy(true, 7.25)));
    }

    #[tokio::test]
    async fn below_threshold_is_not_hashed() {
        let analyzer = Scripted::new(true, 7.24);
        let record = classify(Path::new("/bin/x"), &policy(true, 7.25), &analyzer)
            .await
            .unwrap();

        assert_eq!(record.entropy, Some(7.24));
        assert_eq!(record.digests, None);
        assert_eq!(analyzer.digest_calls.load(Ordering::SeqCst), 0);
        assert!(!record.is_reportable(&policy(true, 7.25)));
    }

    #[tokio::test]
    async fn each_step_runs_at_most_once() {
        let analyzer = Scripted::new(true, 8.0);
        classify(Path::new("/bin/x"), &policy(false, 0.0), &analyzer)
            .await
            .unwrap();

        assert_eq!(analyzer.entropy_calls.load(Ordering::SeqCst), 1);
        assert_eq!(analyzer.digest_calls.load(Ordering::SeqCst), 1);
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn policy_rejects_out_of_range_threshold() {
        assert!(ScanPolicy::new(false, -0.01).is_err());
        assert!(ScanPolicy::new(false, 8.01).is_err());
        assert!(ScanPolicy::new(false, f64::NAN).is_err());
        assert!(ScanPolicy::new(false, 0.0).is_ok());
        assert!(ScanPolicy::new(false, 8.0).is_ok());
    }

    #[test]
    fn uncomputed_entropy_never_meets_threshold() {
        assert!(!policy(false, 0.0).meets_threshold(None));
        assert!(policy(false, 0.0).meets_threshold(Some(0.0)));
    }

    #[test]
    fn elf_only_copy_keeps_threshold() {
        let forced = policy(false, 6.5).elf_only();
        assert!(forced.elf_only);
        assert!((forced.entropy_threshold - 6.5).abs() < f64::EPSILON);
    }
}
