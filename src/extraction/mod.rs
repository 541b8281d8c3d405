//! Archive extraction after download
//!
//! The format comes from the file signature, not the extension. ZIP and 7z are
//! extracted in-process; gzip, bzip2, xz, zstd and plain tar go through the
//! system `tar`. Output lands in `<archive dir>/<archive stem>/`.

mod sevenz;
mod tar;
mod zip;

pub use sevenz::SevenZipExtractor;
pub use tar::TarExtractor;
pub use zip::ZipExtractor;

use crate::config::ExtractionConfig;
use crate::download::signature;
use crate::error::{Error, ExtractionError, Result};
use crate::types::ArchiveType;
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::{info, warn};

/// Files produced by one extraction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extracted {
    /// Directory the archive was extracted into
    pub dir: PathBuf,
    /// Extracted regular files
    pub files: Vec<PathBuf>,
}

/// Availability of the external tools extraction may need
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolReport {
    /// Resolved `tar` executable, if any
    pub tar: Option<PathBuf>,
}

impl ToolReport {
    /// Formats that can be extracted with the tools present
    pub fn supported(&self) -> Vec<ArchiveType> {
        let mut formats = vec![ArchiveType::Zip, ArchiveType::SevenZip];
        if self.tar.is_some() {
            formats.extend([
                ArchiveType::Tar,
                ArchiveType::Gzip,
                ArchiveType::Bzip2,
                ArchiveType::Xz,
                ArchiveType::Zstd,
            ]);
        }
        formats
    }
}

/// Dispatches archives to the matching extractor
#[derive(Clone, Debug)]
pub struct Extractor {
    tar_path: Option<PathBuf>,
    delete_after: bool,
}

impl Extractor {
    /// Create an extractor from the extraction section of the configuration
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            tar_path: config.tar_path.clone(),
            delete_after: config.delete_after,
        }
    }

    /// Report which external tools are available
    pub fn check_tools(&self) -> ToolReport {
        ToolReport {
            tar: self.tar_extractor().map(|t| t.binary_path().to_path_buf()),
        }
    }

    /// Extract `archive` next to itself
    ///
    /// # Errors
    /// - [`ExtractionError::UnknownFormat`] if the signature is not recognised
    ///   or the format has no extractor (RAR)
    /// - [`Error::ExternalTool`] if a tar-family archive is found but no `tar`
    /// - [`ExtractionError::Failed`] for corrupt or unsafe archives
    pub async fn extract(&self, archive: &Path) -> Result<Extracted> {
        let format = signature::detect_file(archive)?.ok_or_else(|| {
            ExtractionError::UnknownFormat {
                archive: archive.to_path_buf(),
            }
        })?;
        let dir = extraction_dir(archive);

        info!(archive = %archive.display(), ?format, dir = %dir.display(), "extracting");

        let files = match format {
            ArchiveType::Zip => run_blocking(archive, &dir, ZipExtractor::extract).await?,
            ArchiveType::SevenZip => run_blocking(archive, &dir, SevenZipExtractor::extract).await?,
            ArchiveType::Tar
            | ArchiveType::Gzip
            | ArchiveType::Bzip2
            | ArchiveType::Xz
            | ArchiveType::Zstd => {
                let tar = self.tar_extractor().ok_or_else(|| {
                    Error::ExternalTool(format!(
                        "tar is required to extract {} but no tar binary was found",
                        archive.display()
                    ))
                })?;
                tar.extract(archive, &dir).await?
            }
            ArchiveType::Rar => {
                return Err(ExtractionError::UnknownFormat {
                    archive: archive.to_path_buf(),
                }
                .into());
            }
        };

        info!(archive = %archive.display(), files = files.len(), "extraction complete");

        if self.delete_after
            && let Err(e) = tokio::fs::remove_file(archive).await
        {
            warn!(archive = %archive.display(), error = %e, "could not delete archive");
        }

        Ok(Extracted { dir, files })
    }

    /// Configured `tar` if it exists, otherwise the one on `PATH`
    fn tar_extractor(&self) -> Option<TarExtractor> {
        match &self.tar_path {
            Some(path) if path.is_file() => Some(TarExtractor::new(path.clone())),
            Some(path) => {
                warn!(path = %path.display(), "configured tar binary does not exist");
                None
            }
            None => TarExtractor::from_path(),
        }
    }
}

/// `<parent>/<stem>` with archive suffixes (including `.tar.gz` and friends) removed
///
/// ```
/// use zenodo_dl::extraction::extraction_dir;
/// use std::path::Path;
///
/// assert_eq!(extraction_dir(Path::new("/out/data.tar.gz")), Path::new("/out/data"));
/// assert_eq!(extraction_dir(Path::new("/out/42.zip")), Path::new("/out/42"));
/// ```
pub fn extraction_dir(archive: &Path) -> PathBuf {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    const SUFFIXES: &[&str] = &[
        ".tar.gz", ".tar.bz2", ".tar.xz", ".tar.zst", ".tgz", ".tbz2", ".txz", ".zip", ".7z",
        ".tar", ".gz", ".bz2", ".xz", ".zst", ".rar",
    ];
    let lower = name.to_ascii_lowercase();
    // Without a known suffix the stem would be the archive's own name
    let stem = SUFFIXES
        .iter()
        .find(|s| lower.ends_with(*s) && lower.len() > s.len())
        .map(|s| name[..name.len() - s.len()].to_string())
        .unwrap_or_else(|| format!("{}_extracted", name));

    archive
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(stem)
}

async fn run_blocking(
    archive: &Path,
    dir: &Path,
    extract: fn(&Path, &Path) -> Result<Vec<PathBuf>>,
) -> Result<Vec<PathBuf>> {
    let archive_owned = archive.to_path_buf();
    let dir_owned = dir.to_path_buf();
    spawn_blocking(move || extract(&archive_owned, &dir_owned))
        .await
        .map_err(|e| {
            Error::Extraction(ExtractionError::Failed {
                archive: archive.to_path_buf(),
                reason: format!("extraction task panicked: {}", e),
            })
        })?
}

/// Recursively collect all regular files under `dir`
pub(crate) fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    fn visit(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                visit(&path, files)?;
            } else {
                files.push(path);
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    visit(dir, &mut files)?;
    files.sort();
    Ok(files)
}

/// Fail if anything under `dir` resolves outside it (symlinks included)
pub(crate) fn ensure_contained(dir: &Path, archive: &Path) -> Result<()> {
    let root = dir.canonicalize()?;

    fn check(path: &Path, root: &Path, archive: &Path) -> Result<()> {
        for entry in std::fs::read_dir(path)? {
            let entry_path = entry?.path();
            let resolved = entry_path.canonicalize()?;
            if !resolved.starts_with(root) {
                return Err(ExtractionError::Failed {
                    archive: archive.to_path_buf(),
                    reason: format!(
                        "path traversal detected: {} is outside the destination",
                        resolved.display()
                    ),
                }
                .into());
            }
            if entry_path.is_dir() {
                check(&entry_path, root, archive)?;
            }
        }
        Ok(())
    }

    check(dir, &root, archive)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
