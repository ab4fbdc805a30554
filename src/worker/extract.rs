//! Zip extraction into the destination directory

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

const ARCHIVE_EXTENSION: &str = "zip";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("corrupt archive {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExtractError + '_ {
    move |source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn corrupt(path: &Path, reason: impl ToString) -> ExtractError {
    ExtractError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Whether the file name carries the archive extension (case-insensitive)
pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
        .unwrap_or(false)
}

/// Extract every member of `archive_path` into `dest`, then delete the archive.
///
/// Members keep their relative paths inside `dest`; entries whose names would
/// escape `dest` are skipped. Each member is staged next to its final path and
/// renamed into place, so concurrent extractions of the same member never see
/// a partial file and the last rename wins. On failure the archive is deleted
/// as well and members already written are left in place.
pub fn extract_and_remove(archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let result = extract_all(archive_path, dest);

    if let Err(e) = std::fs::remove_file(archive_path) {
        if result.is_ok() {
            return Err(io_error(archive_path)(e));
        }
        warn!(path = %archive_path.display(), error = %e, "Failed to remove archive after failed extraction");
    }

    result
}

fn extract_all(archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let file = File::open(archive_path).map_err(io_error(archive_path))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| corrupt(archive_path, e))?;

    let mut extracted = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| corrupt(archive_path, e))?;

        let out_path = match entry.enclosed_name() {
            Some(name) => dest.join(name),
            None => {
                warn!(name = entry.name(), "Skipping entry with unsafe path");
                continue;
            }
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(io_error(&out_path))?;
            continue;
        }

        let parent = out_path.parent().unwrap_or(dest);
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;

        let mut staged = NamedTempFile::new_in(parent).map_err(io_error(&out_path))?;
        copy_entry(&mut entry, &mut staged, archive_path, &out_path)?;
        staged
            .persist(&out_path)
            .map_err(|e| io_error(&out_path)(e.error))?;

        debug!(path = %out_path.display(), "Extracted archive member");
        extracted.push(out_path);
    }

    Ok(extracted)
}

/// Copy one member; read errors (bad CRC, truncated data) mean a corrupt
/// archive, write errors mean a local I/O failure.
fn copy_entry(
    entry: &mut impl Read,
    out: &mut impl Write,
    archive_path: &Path,
    out_path: &Path,
) -> Result<(), ExtractError> {
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = entry.read(&mut buf).map_err(|e| corrupt(archive_path, e))?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n]).map_err(io_error(out_path))?;
    }
    out.flush().map_err(io_error(out_path))
}
