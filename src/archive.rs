use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use anyhow::Context;
use flate2::{Compression, write::GzEncoder};
use sha2::{Digest, Sha256};
use tar::Builder;
use tempfile::NamedTempFile;

/// A written release archive
#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    /// Where the archive was written
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Hex encoded SHA-256 of the archive
    pub sha256: String,
}

/// Compress `src_dir` into a gzipped tarball at `archive`.
///
/// Entries are stored under the directory's own name, so `dist/main` stays `dist/main`.
/// An existing archive is overwritten.
///
/// # Errors
/// If `src_dir` isn't a directory, the archive would end up inside it, or writing fails.
pub async fn archive_dir(src_dir: PathBuf, archive: PathBuf) -> anyhow::Result<ArchiveSummary> {
    let summary = tokio::task::spawn_blocking(move || write_archive(&src_dir, &archive)).await??;
    tracing::info!(
        archive = %summary.path.display(),
        size = summary.size,
        sha256 = %summary.sha256,
        "wrote archive"
    );
    Ok(summary)
}

fn write_archive(src_dir: &Path, archive: &Path) -> anyhow::Result<ArchiveSummary> {
    if !src_dir.is_dir() {
        anyhow::bail!("nothing to archive, {} is not a directory", src_dir.display());
    }
    let name = src_dir
        .canonicalize()?
        .file_name()
        .map(ToOwned::to_owned)
        .with_context(|| format!("{} has no directory name", src_dir.display()))?;

    let parent = archive
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    if canonical(parent)?.starts_with(src_dir.canonicalize()?) {
        anyhow::bail!(
            "archive {} must not be written inside {}",
            archive.display(),
            src_dir.display()
        );
    }
    fs::create_dir_all(parent)?;

    // Written next to the destination and renamed over it, so a failed run keeps the old archive
    let file = NamedTempFile::new_in(parent)
        .with_context(|| format!("creating archive in {}", parent.display()))?;
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    builder.append_dir_all(&name, src_dir)?;
    builder
        .into_inner()?
        .finish()?
        .persist(archive)
        .with_context(|| format!("writing archive {}", archive.display()))?;

    let mut hasher = Sha256::new();
    let size = io::copy(&mut File::open(archive)?, &mut hasher)?;

    Ok(ArchiveSummary {
        path: archive.to_owned(),
        size,
        sha256: hex::encode(hasher.finalize()),
    })
}

/// Canonical form of `path`, which doesn't have to exist yet
fn canonical(path: &Path) -> io::Result<PathBuf> {
    let mut existing = std::path::absolute(path)?;
    let mut missing = vec![];
    loop {
        match existing.canonicalize() {
            Ok(found) => return Ok(missing.into_iter().rev().fold(found, |p, c| p.join(c))),
            Err(err) => {
                let Some(name) = existing.file_name().map(ToOwned::to_owned) else {
                    return Err(err);
                };
                missing.push(name);
                if !existing.pop() {
                    return Err(err);
                }
            }
        }
    }
}
