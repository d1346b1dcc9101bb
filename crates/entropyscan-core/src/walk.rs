//! Directory-tree target source.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Result, ScanError};

/// Lazily walk `root` and yield every regular file beneath it.
///
/// Symbolic links are not followed and are never yielded; neither are
/// devices, FIFOs or sockets. Walk failures are yielded as errors so the
/// sweep can apply its error policy to them.
pub fn regular_files(root: &Path) -> impl Iterator<Item = Result<PathBuf>> + Send {
    let root = root.to_path_buf();
    WalkDir::new(&root)
        .follow_links(false)
        .into_iter()
        .filter_map(move |entry| match entry {
            Ok(e) if e.file_type().is_file() => Some(Ok(e.into_path())),
            Ok(_) => None,
            Err(e) => Some(Err(walk_error(&root, e))),
        })
}

fn walk_error(root: &Path, err: walkdir::Error) -> ScanError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let reason = err.to_string();
    match err.into_io_error() {
        Some(io) => ScanError::io(path, io),
        None => ScanError::Walk {
            path: path.display().to_string(),
            reason,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn yields_only_regular_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.bin"), b"a").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.bin"), b"b").unwrap();
        std::os::unix::fs::symlink(dir.path().join("a.bin"), dir.path().join("link")).unwrap();

        let mut found: Vec<_> = regular_files(dir.path()).map(Result::unwrap).collect();
        found.sort();

        assert_eq!(
            found,
            vec![dir.path().join("a.bin"), dir.path().join("sub/b.bin")]
        );
    }

    #[test]
    fn missing_root_is_vanished() {
        let dir = tempdir().unwrap();
        let errors: Vec<_> = regular_files(&dir.path().join("gone")).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].as_ref().unwrap_err().is_vanished());
    }
}
