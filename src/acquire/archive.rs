use std::fs::{self, File};
use std::path::Path;

use thiserror::Error;

const MAX_ZIP_ENTRIES: usize = 1_000;
const MAX_ZIP_ENTRY_UNCOMPRESSED_BYTES: u64 = 2 * 1024 * 1024 * 1024;
const MAX_ZIP_TOTAL_UNCOMPRESSED_BYTES: u64 = 8 * 1024 * 1024 * 1024;
const MAX_ZIP_COMPRESSION_RATIO: u64 = 200;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to extract archive: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Archive rejected: {0}")]
    Limit(String),
}

#[derive(Clone, Copy)]
pub(super) struct ExtractionLimits {
    max_entries: usize,
    max_entry_uncompressed_bytes: u64,
    max_total_uncompressed_bytes: u64,
    max_compression_ratio: u64,
}

impl ExtractionLimits {
    pub(super) fn standard() -> Self {
        Self {
            max_entries: MAX_ZIP_ENTRIES,
            max_entry_uncompressed_bytes: MAX_ZIP_ENTRY_UNCOMPRESSED_BYTES,
            max_total_uncompressed_bytes: MAX_ZIP_TOTAL_UNCOMPRESSED_BYTES,
            max_compression_ratio: MAX_ZIP_COMPRESSION_RATIO,
        }
    }
}

/// Extract a dataset archive into `dest_dir`, returning the number of files written.
///
/// Entries whose names escape `dest_dir` are skipped. Extracted files are plain data and
/// never keep executable bits.
pub(super) fn unzip_to_dir(
    zip_path: &Path,
    dest_dir: &Path,
    limits: ExtractionLimits,
) -> Result<usize, ArchiveError> {
    let mut archive = zip::ZipArchive::new(File::open(zip_path)?)?;
    let entry_count = archive.len();
    if entry_count > limits.max_entries {
        return Err(ArchiveError::Limit(format!(
            "{entry_count} entries, limit is {}",
            limits.max_entries
        )));
    }
    fs::create_dir_all(dest_dir)?;
    let mut total_uncompressed: u64 = 0;
    let mut written = 0usize;
    for i in 0..entry_count {
        let mut entry = archive.by_index(i)?;
        let size = entry.size();
        if size > limits.max_entry_uncompressed_bytes {
            return Err(ArchiveError::Limit(format!(
                "entry '{}' is too large ({size} bytes, limit {})",
                entry.name(),
                limits.max_entry_uncompressed_bytes
            )));
        }
        if size > 0 {
            let compressed = entry.compressed_size();
            if compressed == 0 || size > compressed.saturating_mul(limits.max_compression_ratio) {
                return Err(ArchiveError::Limit(format!(
                    "entry '{}' exceeds compression ratio limit",
                    entry.name()
                )));
            }
        }
        total_uncompressed = total_uncompressed
            .checked_add(size)
            .ok_or_else(|| ArchiveError::Limit("extracted size overflow".into()))?;
        if total_uncompressed > limits.max_total_uncompressed_bytes {
            return Err(ArchiveError::Limit(format!(
                "extracted size {total_uncompressed} exceeds limit {}",
                limits.max_total_uncompressed_bytes
            )));
        }
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!("Skipping archive entry outside destination: {}", entry.name());
            continue;
        };
        let outpath = dest_dir.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&outpath)?;
        std::io::copy(&mut entry, &mut outfile)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&outpath, fs::Permissions::from_mode(0o644))?;
        }
        written += 1;
    }
    Ok(written)
}
