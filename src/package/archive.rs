//! Archive writing and digests.

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, HeaderMode};

use crate::domain::ArchiveFormat;
use crate::error::{PackError, Result};
use crate::utils::to_slash;

/// Write `files` (relative to `staging`) to `dest`, in sorted order with
/// normalised headers so the same bundle always yields the same bytes.
pub fn write_archive(
    staging: &Path,
    files: &BTreeSet<PathBuf>,
    dest: &Path,
    format: ArchiveFormat,
) -> Result<()> {
    let file = File::create(dest).map_err(|e| PackError::io(dest, e))?;
    let written = match format {
        ArchiveFormat::Tar => {
            let mut builder = Builder::new(file);
            append_files(&mut builder, staging, files).and_then(|_| builder.into_inner()).map(drop)
        }
        ArchiveFormat::TarGz => {
            let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
            append_files(&mut builder, staging, files)
                .and_then(|_| builder.into_inner())
                .and_then(|encoder| encoder.finish())
                .map(drop)
        }
    };
    written.map_err(|e| PackError::io(dest, e))
}

fn append_files<W: Write>(
    builder: &mut Builder<W>,
    staging: &Path,
    files: &BTreeSet<PathBuf>,
) -> io::Result<()> {
    builder.mode(HeaderMode::Deterministic);
    for rel in files {
        builder.append_path_with_name(staging.join(rel), to_slash(rel))?;
    }
    Ok(())
}

/// Lowercase hex SHA-256 of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| PackError::io(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| PackError::io(path, e))?;
    Ok(format!("{:x}", hasher.finalize()))
}
