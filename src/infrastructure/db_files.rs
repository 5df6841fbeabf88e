//! Database file handling: working copies, fingerprints and discovery.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::domain::{AppError, Result};

/// Extensions treated as `SQLite` files when scanning.
const SQLITE_EXTENSIONS: &[&str] = &["db", "sqlite", "sqlite3"];

/// Journal files that travel with a database.
const SIDECAR_SUFFIXES: &[&str] = &["-wal", "-shm"];

/// Journal files `SQLite` may leave next to a copy.
const CLEANUP_SUFFIXES: &[&str] = &["-wal", "-shm", "-journal"];

/// A copy of a database in the work directory.
///
/// The copy and its journal files are deleted when this is dropped.
#[derive(Debug)]
pub struct WorkingCopy {
    path: PathBuf,
}

impl WorkingCopy {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkingCopy {
    fn drop(&mut self) {
        let journals = CLEANUP_SUFFIXES.iter().map(|suffix| with_suffix(&self.path, suffix));
        for file in std::iter::once(self.path.clone()).chain(journals) {
            match fs::remove_file(&file) {
                Ok(()) => tracing::debug!("Removed working file {}", file.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove {}: {}", file.display(), e),
            }
        }
    }
}

/// Computes the SHA-256 of a file, lowercase hex.
///
/// # Errors
/// Returns error if the file cannot be read.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open {}", path.display()), e))?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| AppError::io(format!("Failed to read {}", path.display()), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Copies a database and its `-wal`/`-shm` siblings into `work_dir`.
///
/// The copy is named `<file name>.copy_<unix seconds>`, with a numeric
/// suffix if that name is taken. The returned guard removes the copy.
///
/// # Errors
/// Returns error if the directory cannot be created or a copy fails.
pub fn copy_to_work_dir(src: &Path, work_dir: &Path) -> Result<WorkingCopy> {
    fs::create_dir_all(work_dir)
        .map_err(|e| AppError::io(format!("Failed to create {}", work_dir.display()), e))?;

    let file_name = src
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("database.db");
    let stamp = Utc::now().timestamp();

    let mut dst = work_dir.join(format!("{file_name}.copy_{stamp}"));
    let mut n = 1;
    while dst.exists() {
        dst = work_dir.join(format!("{file_name}.copy_{stamp}_{n}"));
        n += 1;
    }

    fs::copy(src, &dst).map_err(|e| {
        AppError::io(
            format!("Failed to copy {} to {}", src.display(), dst.display()),
            e,
        )
    })?;
    let copy = WorkingCopy { path: dst };

    for suffix in SIDECAR_SUFFIXES {
        let sidecar = with_suffix(src, suffix);
        if sidecar.exists() {
            let target = with_suffix(&copy.path, suffix);
            if let Err(e) = fs::copy(&sidecar, &target) {
                tracing::warn!("Failed to copy {}: {}", sidecar.display(), e);
            }
        }
    }

    tracing::info!(from = %src.display(), to = %copy.path.display(), "Copied database to work directory");

    Ok(copy)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

/// Recursively finds `SQLite` files under `root`, sorted by path.
///
/// # Errors
/// Returns error if `root` itself cannot be read.
pub fn find_sqlite_files(root: &Path) -> Result<Vec<PathBuf>> {
    let found: Vec<PathBuf> = walk_files(root)?
        .into_iter()
        .filter(|path| is_sqlite_name(path))
        .collect();

    for path in &found {
        tracing::debug!("Found SQLite file: {}", path.display());
    }
    Ok(found)
}

/// Lists every regular file under `root`, sorted by path.
///
/// Unreadable subdirectories are skipped with a warning.
///
/// # Errors
/// Returns error if `root` itself cannot be read.
pub fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(root)
        .map_err(|e| AppError::io(format!("Failed to read {}", root.display()), e))?;

    let mut found = Vec::new();
    let mut pending: Vec<PathBuf> = Vec::new();

    for entry in entries.filter_map(std::result::Result::ok) {
        classify(entry.path(), &mut found, &mut pending);
    }

    while let Some(dir) = pending.pop() {
        match fs::read_dir(&dir) {
            Ok(entries) => {
                for entry in entries.filter_map(std::result::Result::ok) {
                    classify(entry.path(), &mut found, &mut pending);
                }
            }
            Err(e) => {
                tracing::warn!("Failed to read directory {}: {}", dir.display(), e);
            }
        }
    }

    found.sort();
    Ok(found)
}

fn classify(path: PathBuf, found: &mut Vec<PathBuf>, pending: &mut Vec<PathBuf>) {
    if path.is_dir() {
        pending.push(path);
    } else if path.is_file() {
        found.push(path);
    }
}

fn is_sqlite_name(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SQLITE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sha256_known_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        fs::write(&path, "abc").unwrap();

        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_copy_brings_wal_sibling() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("Storage.db");
        fs::write(&src, "db").unwrap();
        fs::write(dir.path().join("Storage.db-wal"), "wal").unwrap();

        let work = dir.path().join("work");
        let copy = copy_to_work_dir(&src, &work).unwrap();
        let dst = copy.path();

        assert!(dst.exists());
        assert_eq!(fs::read_to_string(with_suffix(dst, "-wal")).unwrap(), "wal");
        assert!(!with_suffix(dst, "-shm").exists());
    }

    #[test]
    fn test_dropping_copy_removes_files() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("Storage.db");
        fs::write(&src, "db").unwrap();
        fs::write(dir.path().join("Storage.db-wal"), "wal").unwrap();
        fs::write(dir.path().join("Storage.db-shm"), "shm").unwrap();

        let work = dir.path().join("work");
        drop(copy_to_work_dir(&src, &work).unwrap());

        assert_eq!(fs::read_dir(&work).unwrap().count(), 0);
        assert!(src.exists());
    }

    #[test]
    fn test_copy_twice_gets_distinct_names() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("msg.db");
        fs::write(&src, "db").unwrap();

        let work = dir.path().join("work");
        let first = copy_to_work_dir(&src, &work).unwrap();
        let second = copy_to_work_dir(&src, &work).unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn test_find_sqlite_files() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("Storage.db"), "").unwrap();
        fs::write(nested.join("msg.SQLITE3"), "").unwrap();
        fs::write(nested.join("notes.txt"), "").unwrap();

        let found = find_sqlite_files(dir.path()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|p| p.ends_with("Storage.db")));
        assert!(found.iter().any(|p| p.ends_with("msg.SQLITE3")));
    }

    #[test]
    fn test_walk_files_lists_everything_sorted() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("sub");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();
        fs::write(nested.join("a.db"), "").unwrap();

        let files = walk_files(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("b.txt"), nested.join("a.db")]);
    }
}
