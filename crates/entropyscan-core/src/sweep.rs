//! Multi-target sweeps over a directory tree or the PID space.
//!
//! A sweep classifies up to `jobs` targets at a time and yields records in
//! the order the targets were discovered, so output is identical whether it
//! runs sequentially or in parallel. With `jobs` in flight there are never
//! more than `jobs` target files open at once.
//!
//! Per-target errors are triaged rather than propagated blindly:
//!
//! | error                          | files sweep        | process sweep |
//! |--------------------------------|--------------------|---------------|
//! | vanished / not regular / large | skip               | skip          |
//! | other I/O                      | [`ErrorPolicy`]    | skip          |
//! | cancelled / malformed input    | abort              | abort         |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future;
use futures_util::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::cancel::{check_cancelled, CancellationToken};
use crate::classify::{classify, Analyzer, ClassificationRecord, ScanPolicy};
use crate::error::{ErrorCategory, Result, ScanError};

/// What to do when a file that exists cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Stop the sweep. An unreadable file during a security sweep is itself
    /// suspicious.
    #[default]
    Abort,
    /// Log a warning and continue with the next target.
    Skip,
}

impl FromStr for ErrorPolicy {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            _ => Err(ScanError::InvalidPolicy(format!(
                "unknown error policy: {s} (expected abort or skip)"
            ))),
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Where the targets come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    /// Paths from a directory walk or an explicit list.
    Files,
    /// Candidate `/proc/<pid>/exe` paths. Missing PIDs are the norm.
    Processes,
}

/// Tallies for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Targets handed to the classifier.
    pub examined: u64,
    /// Records produced.
    pub records: u64,
    /// Targets dropped without a record.
    pub skipped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    examined: AtomicU64,
    records: AtomicU64,
    skipped: AtomicU64,
}

enum Disposition {
    Skip,
    Abort,
}

/// A configured sweep. Build once, then [`Sweep::run`] it over a target
/// source.
#[derive(Debug)]
pub struct Sweep<A> {
    analyzer: A,
    policy: ScanPolicy,
    mode: SweepMode,
    jobs: usize,
    on_error: ErrorPolicy,
    cancel: CancellationToken,
    counters: Counters,
}

impl<A: Analyzer> Sweep<A> {
    /// Sweep over filesystem paths.
    pub fn files(analyzer: A, policy: ScanPolicy) -> Self {
        Self::new(analyzer, policy, SweepMode::Files)
    }

    /// Sweep over process images. ELF-only is always on: anything that is
    /// not ELF did not resolve to a process image.
    pub fn processes(analyzer: A, policy: ScanPolicy) -> Self {
        Self::new(analyzer, policy.elf_only(), SweepMode::Processes)
    }

    fn new(analyzer: A, policy: ScanPolicy, mode: SweepMode) -> Self {
        Self {
            analyzer,
            policy,
            mode,
            jobs: 1,
            on_error: ErrorPolicy::default(),
            cancel: CancellationToken::new(),
            counters: Counters::default(),
        }
    }

    /// Number of targets classified concurrently (minimum 1).
    #[must_use]
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    #[must_use]
    pub fn on_error(mut self, on_error: ErrorPolicy) -> Self {
        self.on_error = on_error;
        self
    }

    /// Token checked between targets. Share it with the analyzer so a long
    /// read is interrupted too.
    #[must_use]
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub const fn policy(&self) -> &ScanPolicy {
        &self.policy
    }

    pub const fn mode(&self) -> SweepMode {
        self.mode
    }

    /// Snapshot of the counters so far.
    pub fn stats(&self) -> SweepStats {
        SweepStats {
            examined: self.counters.examined.load(Ordering::Relaxed),
            records: self.counters.records.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }

    /// Classify every target, yielding records in discovery order.
    ///
    /// The stream ends after the first `Err`; skipped targets never appear.
    pub fn run<'a, I>(&'a self, targets: I) -> impl Stream<Item = Result<ClassificationRecord>> + 'a
    where
        I: IntoIterator<Item = Result<PathBuf>>,
        I::IntoIter: 'a,
    {
        stream::iter(targets)
            .map(move |target| self.classify_one(target))
            .buffered(self.jobs)
            .filter_map(move |outcome| future::ready(self.triage(outcome)))
            .scan(false, |failed, item| {
                if *failed {
                    return future::ready(None);
                }
                *failed = item.is_err();
                future::ready(Some(item))
            })
    }

    async fn classify_one(&self, target: Result<PathBuf>) -> Result<Option<ClassificationRecord>> {
        check_cancelled(&self.cancel)?;
        let path = target?;
        self.counters.examined.fetch_add(1, Ordering::Relaxed);

        let record = classify(&path, &self.policy, &self.analyzer).await?;
        if self.mode == SweepMode::Processes && !record.is_elf {
            trace!(path = %path.display(), "candidate is not a process image");
            return Ok(None);
        }
        Ok(Some(record))
    }

    fn triage(
        &self,
        outcome: Result<Option<ClassificationRecord>>,
    ) -> Option<Result<ClassificationRecord>> {
        match outcome {
            Ok(Some(record)) => {
                self.counters.records.fetch_add(1, Ordering::Relaxed);
                Some(Ok(record))
            }
            Ok(None) => {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => match self.disposition(&e) {
                Disposition::Skip => {
                    self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                    None
                }
                Disposition::Abort => Some(Err(e)),
            },
        }
    }

    fn disposition(&self, err: &ScanError) -> Disposition {
        let category = err.category();
        match category {
            ErrorCategory::Cancelled | ErrorCategory::Malformed => Disposition::Abort,
            _ if self.mode == SweepMode::Processes => {
                trace!(error = %err, "process candidate skipped");
                Disposition::Skip
            }
            c if c.is_benign() => {
                debug!(error = %err, "skipping target");
                Disposition::Skip
            }
            _ => match self.on_error {
                ErrorPolicy::Abort => Disposition::Abort,
                ErrorPolicy::Skip => {
                    warn!(error = %err, "unreadable target skipped");
                    Disposition::Skip
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::{digest_bytes, DigestSet};
    use async_trait::async_trait;
    use std::io;
    use std::path::Path;

    /// Answers by file name: `gone*` vanished, `denied*` unreadable,
    /// `big*` too large, `elf*` ELF with entropy 7.5, anything else plain.
    struct ByName;

    fn check(path: &Path) -> Result<()> {
        let name = path.file_name().unwrap().to_str().unwrap();
        if name.starts_with("gone") {
            Err(ScanError::io(path, io::Error::from(io::ErrorKind::NotFound)))
        } else if name.starts_with("denied") {
            Err(ScanError::io(path, io::Error::from(io::ErrorKind::PermissionDenied)))
        } else if name.starts_with("big") {
            Err(ScanError::TooLarge {
                path: name.into(),
                size: 2,
                max: 1,
            })
        } else {
            Ok(())
        }
    }

    #[async_trait]
    impl Analyzer for ByName {
        async fn is_elf(&self, path: &Path) -> Result<bool> {
            check(path)?;
            Ok(path.file_name().unwrap().to_str().unwrap().starts_with("elf"))
        }

        async fn entropy(&self, path: &Path) -> Result<f64> {
            Ok(if self.is_elf(path).await? { 7.5 } else { 4.0 })
        }

        async fn digests(&self, _path: &Path) -> Result<DigestSet> {
            Ok(digest_bytes(b"payload"))
        }
    }

    fn targets(names: &[&str]) -> Vec<Result<PathBuf>> {
        names.iter().map(|n| Ok(PathBuf::from("/t").join(n))).collect()
    }

    async fn collect<A: Analyzer>(sweep: &Sweep<A>, names: &[&str]) -> Vec<Result<ClassificationRecord>> {
        sweep.run(targets(names)).collect().await
    }

    fn names(results: &[Result<ClassificationRecord>]) -> Vec<String> {
        results
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .map(|r| r.name.to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn vanished_files_are_skipped() {
        let sweep = Sweep::files(ByName, ScanPolicy::default());
        let out = collect(&sweep, &["a", "gone1", "elf1", "big1"]).await;

        assert!(out.iter().all(Result::is_ok));
        assert_eq!(names(&out), ["a", "elf1"]);
        assert_eq!(
            sweep.stats(),
            SweepStats {
                examined: 4,
                records: 2,
                skipped: 2
            }
        );
    }

    #[tokio::test]
    async fn unreadable_file_aborts_by_default() {
        let sweep = Sweep::files(ByName, ScanPolicy::default());
        let out = collect(&sweep, &["a", "denied", "b"]).await;

        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        assert!(matches!(out[1], Err(ScanError::Io { .. })));
    }

    #[tokio::test]
    async fn unreadable_file_skipped_when_asked() {
        let sweep = Sweep::files(ByName, ScanPolicy::default()).on_error(ErrorPolicy::Skip);
        let out = collect(&sweep, &["a", "denied", "b"]).await;
        assert_eq!(names(&out), ["a", "b"]);
    }

    #[tokio::test]
    async fn process_sweep_skips_every_failure_and_non_elf() {
        let sweep = Sweep::processes(ByName, ScanPolicy::default());
        assert!(sweep.policy().elf_only);

        let out = collect(&sweep, &["gone", "denied", "kthread", "elf7"]).await;
        assert_eq!(names(&out), ["elf7"]);
        assert_eq!(sweep.stats().skipped, 3);
    }

    #[tokio::test]
    async fn parallel_sweep_keeps_discovery_order() {
        let list: Vec<String> = (0..64).map(|i| format!("elf{i:02}")).collect();
        let refs: Vec<&str> = list.iter().map(String::as_str).collect();

        let sweep = Sweep::files(ByName, ScanPolicy::default()).jobs(8);
        let out = collect(&sweep, &refs).await;
        assert_eq!(names(&out), list);
    }

    #[tokio::test]
    async fn cancelled_sweep_stops() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let sweep = Sweep::files(ByName, ScanPolicy::default()).cancel_token(cancel);

        let out = collect(&sweep, &["a", "b", "c"]).await;
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Err(ScanError::Cancelled)));
    }

    #[test]
    fn error_policy_parses() {
        assert_eq!("skip".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Skip);
        assert_eq!("ABORT".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Abort);
        assert!("retry".parse::<ErrorPolicy>().is_err());
        assert_eq!(ErrorPolicy::Skip.to_string(), "skip");
    }
}
