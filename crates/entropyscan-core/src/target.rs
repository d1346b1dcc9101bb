//! Opening and streaming classification targets.
//!
//! Every primitive (signature, entropy, digests) goes through [`open`], which
//! never blocks on special files: the handle is opened non-blocking and the
//! file type is taken from `fstat` on that handle, so a FIFO swapped in after
//! discovery is rejected instead of hanging the sweep.

use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::path::Path;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncReadExt;

use crate::cancel::{check_cancelled, CancellationToken};
use crate::error::{Result, ScanError};

/// Largest file the engine will read in full (2 GiB).
pub const MAX_FILE_SIZE: u64 = 2_147_483_648;

/// Read size for streaming passes.
pub const DEFAULT_CHUNK_SIZE: usize = 256_000;

/// An open regular file and the size `fstat` reported for it.
#[derive(Debug)]
pub(crate) struct OpenTarget {
    pub file: File,
    pub size: u64,
}

#[derive(Debug)]
pub(crate) enum Opened {
    Regular(OpenTarget),
    NotRegular,
}

/// Open `path` for reading and report whether it is a regular file.
///
/// Dangling symlinks, sockets and other entries that exist but cannot be
/// opened as data are reported as [`Opened::NotRegular`]. A path that does
/// not exist at all is an I/O error of kind `NotFound`.
pub(crate) async fn open(path: &Path) -> Result<Opened> {
    if path.as_os_str().is_empty() {
        return Err(ScanError::InvalidPath);
    }

    let file = match OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .await
    {
        Ok(f) => f,
        Err(e) => return open_failed(path, e).await,
    };

    let meta = file.metadata().await.map_err(|e| ScanError::io(path, e))?;
    if !meta.file_type().is_file() {
        return Ok(Opened::NotRegular);
    }

    Ok(Opened::Regular(OpenTarget {
        file,
        size: meta.len(),
    }))
}

/// Open `path` as a regular file within the size ceiling.
pub(crate) async fn open_regular(path: &Path) -> Result<OpenTarget> {
    match open(path).await? {
        Opened::NotRegular => Err(ScanError::not_regular(path)),
        Opened::Regular(target) if target.size > MAX_FILE_SIZE => Err(ScanError::TooLarge {
            path: path.display().to_string(),
            size: target.size,
            max: MAX_FILE_SIZE,
        }),
        Opened::Regular(target) => Ok(target),
    }
}

/// Stream an opened target through `sink` in file order.
///
/// Checks `cancel` before every chunk and re-applies the size ceiling to the
/// bytes actually read. Returns the number of bytes consumed.
pub(crate) async fn stream_chunks<F>(
    path: &Path,
    mut target: OpenTarget,
    chunk_size: usize,
    cancel: &CancellationToken,
    mut sink: F,
) -> Result<u64>
where
    F: FnMut(&[u8]) + Send,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total: u64 = 0;

    loop {
        check_cancelled(cancel)?;
        let n = match target.file.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ScanError::io(path, e)),
        };

        total += n as u64;
        if total > MAX_FILE_SIZE {
            return Err(ScanError::TooLarge {
                path: path.display().to_string(),
                size: total,
                max: MAX_FILE_SIZE,
            });
        }
        sink(&buf[..n]);
    }

    Ok(total)
}

/// Final path component, as reported in records. Not decoded, so names
/// that are not valid UTF-8 survive intact.
#[must_use]
pub fn file_name(path: &Path) -> OsString {
    path.file_name().map(OsStr::to_os_string).unwrap_or_default()
}

/// Sort a failed open into "exists but is not data" or a real error.
///
/// `NotFound` is by far the common case in a PID sweep, so it costs a single
/// `lstat`: only a dangling link can fail that way and still exist.
async fn open_failed(path: &Path, err: std::io::Error) -> Result<Opened> {
    let exists_but_not_regular = if err.kind() == ErrorKind::NotFound {
        is_symlink(path).await
    } else {
        match tokio::fs::metadata(path).await {
            Ok(meta) => !meta.file_type().is_file(),
            Err(_) => is_symlink(path).await,
        }
    };

    if exists_but_not_regular {
        Ok(Opened::NotRegular)
    } else {
        Err(ScanError::io(path, err))
    }
}

async fn is_symlink(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path)
        .await
        .is_ok_and(|m| m.file_type().is_symlink())
}
