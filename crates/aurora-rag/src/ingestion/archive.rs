//! Zip bundle extraction

use std::fs::File;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Whether the path names a zip bundle
pub fn is_zip(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

/// Extract `archive` into `dest`, returning the extracted file paths.
///
/// Entries whose names would land outside `dest` abort the extraction.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(archive).map_err(|e| {
        Error::Archive(format!("cannot open {}: {}", archive.display(), e))
    })?;
    let mut zip = zip::ZipArchive::new(file)?;
    std::fs::create_dir_all(dest)?;

    let mut extracted = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            Error::Archive(format!(
                "entry '{}' in {} escapes the extraction directory",
                entry.name(),
                archive.display()
            ))
        })?;
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out)?;
        extracted.push(out_path);
    }

    tracing::debug!(
        "Extracted {} files from {} into {}",
        extracted.len(),
        archive.display(),
        dest.display()
    );
    Ok(extracted)
}

/// All regular files under `dir` accepted by `filter`, sorted by path
pub fn collect_files(dir: &Path, filter: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| filter(path))
        .collect();
    files.sort();
    files
}
