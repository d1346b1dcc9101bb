//! ELF magic-number detection.

use std::io::ErrorKind;
use std::path::Path;

use tokio::io::AsyncReadExt;

use crate::error::{Result, ScanError};
use crate::target::{self, Opened};

/// `0x7F 'E' 'L' 'F'`
pub const ELF_MAGIC: [u8; 4] = *b"\x7fELF";

/// Returns true if `prefix` starts with the ELF magic.
#[must_use]
pub fn has_elf_magic(prefix: &[u8]) -> bool {
    prefix.starts_with(&ELF_MAGIC)
}

/// Check whether the file at `path` is an ELF binary.
///
/// Non-regular files and files shorter than four bytes are a plain `false`,
/// not an error. Failure to open the path is an error.
pub async fn is_elf(path: &Path) -> Result<bool> {
    let mut target = match target::open(path).await? {
        Opened::NotRegular => return Ok(false),
        Opened::Regular(t) => t,
    };

    if target.size < ELF_MAGIC.len() as u64 {
        return Ok(false);
    }

    let mut magic = [0u8; ELF_MAGIC.len()];
    match target.file.read_exact(&mut magic).await {
        Ok(_) => Ok(magic == ELF_MAGIC),
        // Truncated between fstat and read.
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(ScanError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::process::Command;
    use tempfile::{tempdir, NamedTempFile};

    fn file_with(bytes: &[u8]) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(bytes).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    #[test]
    fn magic_prefix() {
        assert!(has_elf_magic(b"\x7fELF\x02\x01\x01"));
        assert!(!has_elf_magic(b"\x7fELG"));
        assert!(!has_elf_magic(b"MZ\x90\x00"));
        assert!(!has_elf_magic(b"\x7fEL"));
    }

    #[tokio::test]
    async fn exact_magic_is_elf() {
        let tmp = file_with(&[0x7f, 0x45, 0x4c, 0x46]);
        assert!(is_elf(tmp.path()).await.unwrap());
    }

    #[tokio::test]
    async fn magic_followed_by_payload_is_elf() {
        let mut data = ELF_MAGIC.to_vec();
        data.extend_from_slice(&[0u8; 60]);
        let tmp = file_with(&data);
        assert!(is_elf(tmp.path()).await.unwrap());
    }

    #[tokio::test]
    async fn other_prefix_is_not_elf() {
        let tmp = file_with(b"#!/bin/sh\necho hi\n");
        assert!(!is_elf(tmp.path()).await.unwrap());
    }

    #[tokio::test]
    async fn short_files_are_not_elf() {
        for len in 0..4 {
            let tmp = file_with(&ELF_MAGIC[..len]);
            assert!(!is_elf(tmp.path()).await.unwrap(), "len {len}");
        }
    }

    #[tokio::test]
    async fn named_pipe_is_not_elf() {
        let dir = tempdir().unwrap();
        let fifo = dir.path().join("pipe");
        let status = Command::new("mkfifo").arg(&fifo).status().unwrap();
        assert!(status.success());

        assert!(!is_elf(&fifo).await.unwrap());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = is_elf(&dir.path().join("missing")).await.unwrap_err();
        assert!(err.is_vanished());
    }
}
