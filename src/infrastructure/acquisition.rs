//! Folder acquisition: a hashed copy of a Zalo data folder.
//!
//! Each run creates `<out>/acq_<folder>_<UTC timestamp>/` holding the copied
//! tree under `data/` and three JSON records: `manifest.json` (one entry
//! per file with its sha256), `chain_of_custody.json` and `summary.json`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::db_files::{sha256_file, walk_files};
use crate::domain::{AppError, Result};

/// Who acquires the data and why.
#[derive(Debug, Clone, Default)]
pub struct Custody {
    pub case_id: String,
    pub collector: String,
    pub reason: String,
    /// The operator confirmed they may acquire this data.
    pub consent: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestItem {
    pub original_path: PathBuf,
    pub acquired_path: PathBuf,
    pub rel_path: String,
    pub size: u64,
    pub mtime: Option<DateTime<Utc>>,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub created_at: DateTime<Utc>,
    pub source: PathBuf,
    pub items: Vec<ManifestItem>,
}

#[derive(Debug, Serialize)]
struct CustodyRecord<'a> {
    case_id: &'a str,
    collector: &'a str,
    collected_at: DateTime<Utc>,
    reason: &'a str,
    source: &'a Path,
    workspace: &'a Path,
}

#[derive(Debug, Serialize)]
struct Summary {
    summary_created_at: DateTime<Utc>,
    total_files: usize,
    total_bytes: u64,
}

/// A finished acquisition.
#[derive(Debug)]
pub struct Acquisition {
    pub workspace: PathBuf,
    pub manifest: Manifest,
}

impl Acquisition {
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.manifest.items.iter().map(|item| item.size).sum()
    }
}

/// Copies every file under `src` into a new workspace below `out_dir`.
///
/// The source tree is only read. Files that cannot be copied are skipped
/// with a warning and left out of the manifest.
///
/// # Errors
/// Returns `Config` without consent, `NotFound` if `src` is not a
/// directory, and `Io` if the workspace or its records cannot be written.
pub fn acquire(src: &Path, out_dir: &Path, custody: &Custody) -> Result<Acquisition> {
    if !custody.consent {
        return Err(AppError::Config {
            message: "Acquisition requires consent (pass --consent if you are authorized)".into(),
        });
    }
    if !src.is_dir() {
        return Err(AppError::not_found(format!("folder {}", src.display())));
    }

    // Listed before the workspace exists so an output inside `src` is not copied into itself.
    let files = walk_files(src)?;

    let workspace = create_workspace(src, out_dir)?;
    let data_dir = workspace.join("data");

    let mut items = Vec::with_capacity(files.len());
    for file in &files {
        match copy_item(src, file, &data_dir) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!("Skipping {}: {}", file.display(), e),
        }
    }

    let manifest = Manifest {
        created_at: Utc::now(),
        source: src.to_path_buf(),
        items,
    };
    write_json_atomic(&workspace.join("manifest.json"), &manifest)?;

    let custody_record = CustodyRecord {
        case_id: &custody.case_id,
        collector: &custody.collector,
        collected_at: Utc::now(),
        reason: &custody.reason,
        source: src,
        workspace: &workspace,
    };
    write_json_atomic(&workspace.join("chain_of_custody.json"), &custody_record)?;

    let acquisition = Acquisition {
        workspace,
        manifest,
    };
    let summary = Summary {
        summary_created_at: Utc::now(),
        total_files: acquisition.manifest.items.len(),
        total_bytes: acquisition.total_bytes(),
    };
    write_json_atomic(&acquisition.workspace.join("summary.json"), &summary)?;

    tracing::info!(
        workspace = %acquisition.workspace.display(),
        files = summary.total_files,
        bytes = summary.total_bytes,
        "Acquisition complete"
    );
    Ok(acquisition)
}

fn create_workspace(src: &Path, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .map_err(|e| AppError::io(format!("Failed to create {}", out_dir.display()), e))?;

    let name = src
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("source");
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");

    let mut workspace = out_dir.join(format!("acq_{name}_{stamp}"));
    let mut n = 1;
    while workspace.exists() {
        workspace = out_dir.join(format!("acq_{name}_{stamp}_{n}"));
        n += 1;
    }

    let data_dir = workspace.join("data");
    fs::create_dir_all(&data_dir)
        .map_err(|e| AppError::io(format!("Failed to create {}", data_dir.display()), e))?;
    Ok(workspace)
}

fn copy_item(src_root: &Path, file: &Path, data_dir: &Path) -> Result<ManifestItem> {
    let rel = file.strip_prefix(src_root).unwrap_or(file);
    let dst = data_dir.join(rel);

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io(format!("Failed to create {}", parent.display()), e))?;
    }
    fs::copy(file, &dst).map_err(|e| {
        AppError::io(
            format!("Failed to copy {} to {}", file.display(), dst.display()),
            e,
        )
    })?;

    let metadata = fs::metadata(file)
        .map_err(|e| AppError::io(format!("Failed to stat {}", file.display()), e))?;

    Ok(ManifestItem {
        original_path: file.to_path_buf(),
        sha256: sha256_file(&dst)?,
        acquired_path: dst,
        rel_path: rel.to_string_lossy().replace('\\', "/"),
        size: metadata.len(),
        mtime: metadata.modified().ok().map(DateTime::<Utc>::from),
    })
}

/// Writes pretty JSON to a temporary sibling, then renames it into place.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(AppError::json_parse)?;

    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, json)
        .map_err(|e| AppError::io(format!("Failed to write {}", tmp.display()), e))?;
    fs::rename(&tmp, path)
        .map_err(|e| AppError::io(format!("Failed to move {} into place", path.display()), e))
}
