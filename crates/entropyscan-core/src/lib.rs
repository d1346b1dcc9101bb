//! # entropyscan-core
//!
//! Find packed or encrypted files and running processes on Linux.
//!
//! Packers and crypters leave executables looking like noise. A cheap
//! signature check narrows the field to ELF binaries, Shannon entropy
//! measures how random each one is, and anything over the threshold gets
//! MD5/SHA-1/SHA-256/SHA-512 digests for triage and lookup.
//!
//! ## Data Flow
//!
//! ```text
//! target source                       classifier                 reporter
//!   walk::regular_files(dir)  ─┐
//!   process::PidRange (bust)  ─┼─> sweep::Sweep ─> classify() ─> ClassificationRecord
//!   single path               ─┘     (jobs, skip/abort)   │
//!                                                    Analyzer
//!                                        is_elf -> entropy -> digests
//! ```
//!
//! Process enumeration never lists `/proc`; it tries every PID directly so
//! that processes hidden from the directory listing by a rootkit are still
//! examined.

pub mod cancel;
pub mod classify;
pub mod digest;
pub mod entropy;
pub mod error;
pub mod process;
pub mod signature;
pub mod sweep;
pub mod target;
pub mod walk;

pub use cancel::{check_cancelled, CancellationToken};
pub use classify::{classify, Analyzer, ClassificationRecord, FsAnalyzer, ScanPolicy};
pub use digest::DigestSet;
pub use error::{ErrorCategory, Result, ScanError};
pub use process::{PidRange, ProcListing, MAX_PID, MIN_PID};
pub use sweep::{ErrorPolicy, Sweep, SweepMode, SweepStats};
pub use target::MAX_FILE_SIZE;

use std::path::Path;

/// Classify one explicitly named file with the filesystem analyzer.
pub async fn scan_file(path: &Path, policy: &ScanPolicy) -> Result<ClassificationRecord> {
    classify(path, policy, &FsAnalyzer::default()).await
}
