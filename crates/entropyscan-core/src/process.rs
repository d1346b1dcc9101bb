//! Process image enumeration by PID busting.
//!
//! Rootkits that hook `getdents` can drop entries from a `/proc` listing,
//! but a direct `open("/proc/<pid>/exe")` often still works. So instead of
//! listing `/proc`, every PID in the legal range is turned into a candidate
//! path and tried on its own. Nonexistent PIDs simply fail to open.

use std::collections::HashSet;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{Result, ScanError};

/// Root of the process filesystem.
pub const PROC_DIR: &str = "/proc";

/// Lowest valid PID.
pub const MIN_PID: u32 = 1;

/// Exclusive upper bound: 2^22, the 64-bit Linux PID ceiling.
pub const MAX_PID: u32 = 4_194_304;

/// Canonical process image path for `pid`.
#[must_use]
pub fn exe_path(pid: u32) -> PathBuf {
    Path::new(PROC_DIR).join(pid.to_string()).join("exe")
}

/// Recover the PID from a path built by [`exe_path`].
#[must_use]
pub fn pid_of(path: &Path) -> Option<u32> {
    let rest = path.strip_prefix(PROC_DIR).ok()?;
    let mut parts = rest.iter();
    let pid = parts.next()?.to_str()?.parse().ok()?;
    (parts.next()? == "exe" && parts.next().is_none()).then_some(pid)
}

/// Half-open PID interval `[start, end)` to bust.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidRange {
    start: u32,
    end: u32,
}

impl Default for PidRange {
    fn default() -> Self {
        Self {
            start: MIN_PID,
            end: MAX_PID,
        }
    }
}

impl PidRange {
    /// `[MIN_PID, end)`, with `end` clamped to [`MAX_PID`].
    #[must_use]
    pub fn up_to(end: u32) -> Self {
        Self {
            start: MIN_PID,
            end: end.clamp(MIN_PID, MAX_PID),
        }
    }

    /// Range limited to the running kernel's `pid_max`, or the full default
    /// range when that cannot be read.
    #[must_use]
    pub fn from_kernel() -> Self {
        match kernel_pid_max() {
            Ok(max) => Self::up_to(max),
            Err(e) => {
                debug!(error = %e, "pid_max unavailable, using full range");
                Self::default()
            }
        }
    }

    #[must_use]
    pub const fn start(&self) -> u32 {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> u32 {
        self.end
    }

    /// Number of candidates, `end - start`.
    #[must_use]
    pub const fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Fresh lazy iterator over every candidate path. Calling this again
    /// restarts from the beginning.
    #[must_use]
    pub const fn candidates(&self) -> PidCandidates {
        PidCandidates {
            next: self.start,
            end: self.end,
        }
    }
}

impl IntoIterator for PidRange {
    type Item = PathBuf;
    type IntoIter = PidCandidates;

    fn into_iter(self) -> PidCandidates {
        self.candidates()
    }
}

/// Lazy candidate path generator; O(1) memory regardless of the range.
#[derive(Debug, Clone)]
pub struct PidCandidates {
    next: u32,
    end: u32,
}

impl Iterator for PidCandidates {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        if self.next >= self.end {
            return None;
        }
        let pid = self.next;
        self.next += 1;
        Some(exe_path(pid))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PidCandidates {}

impl FusedIterator for PidCandidates {}

/// Read `/proc/sys/kernel/pid_max`.
pub fn kernel_pid_max() -> Result<u32> {
    let path = Path::new(PROC_DIR).join("sys/kernel/pid_max");
    let raw = std::fs::read_to_string(&path).map_err(|e| ScanError::io(&path, e))?;
    raw.trim()
        .parse()
        .map_err(|e| ScanError::Procfs(format!("bad pid_max {:?}: {e}", raw.trim())))
}

/// PIDs that show up in a normal `/proc` directory listing.
///
/// A PID that opens by direct path but is missing here is hidden.
pub fn visible_pids() -> Result<HashSet<u32>> {
    let all = procfs::process::all_processes().map_err(|e| ScanError::Procfs(e.to_string()))?;

    Ok(all
        .filter_map(std::result::Result::ok)
        .filter_map(|p| u32::try_from(p.pid).ok())
        .collect())
}

/// Snapshot of the `/proc` listing used to spot hidden processes.
///
/// A PID missing from the snapshot triggers one fresh listing before it is
/// called hidden, so a process that started after the snapshot was taken is
/// not misreported. Thread IDs also open by direct path but are only listed
/// under their thread group, so those are never hidden.
#[derive(Debug, Clone)]
pub struct ProcListing {
    visible: HashSet<u32>,
}

impl ProcListing {
    pub fn read() -> Result<Self> {
        Ok(Self {
            visible: visible_pids()?,
        })
    }

    /// Whether `pid` opened by direct path but is absent from the listing.
    pub fn is_hidden(&mut self, pid: u32) -> Result<bool> {
        if self.visible.contains(&pid) {
            return Ok(false);
        }
        match thread_group(pid) {
            Some(tgid) if tgid == pid => {}
            Some(tgid) => {
                trace!(pid, tgid, "thread of a listed group");
                return Ok(false);
            }
            None => {
                debug!(pid, "exited before the listing check");
                return Ok(false);
            }
        }
        self.visible = visible_pids()?;
        Ok(!self.visible.contains(&pid))
    }
}

/// Thread group leader of `pid`, or `None` when it can no longer be read.
fn thread_group(pid: u32) -> Option<u32> {
    let raw = i32::try_from(pid).ok()?;
    let status = procfs::process::Process::new(raw)
        .and_then(|p| p.status())
        .ok()?;
    u32::try_from(status.tgid).ok()
}
