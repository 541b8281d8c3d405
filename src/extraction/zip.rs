use crate::error::{Error, ExtractionError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Archive extractor for ZIP files
pub struct ZipExtractor;

impl ZipExtractor {
    /// Extract every entry of `archive_path` into `dest_path`
    ///
    /// Entries whose names would escape `dest_path` are skipped.
    pub fn extract(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "attempting ZIP extraction");

        std::fs::create_dir_all(dest_path)?;

        let file = std::fs::File::open(archive_path)?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| failed(archive_path, e))?;

        let mut extracted_files = Vec::new();
        for i in 0..archive.len() {
            let entry = archive.by_index(i).map_err(|e| failed(archive_path, e))?;
            if let Some(path) = Self::extract_entry(entry, dest_path)? {
                extracted_files.push(path);
            }
        }

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "ZIP extraction successful"
        );
        Ok(extracted_files)
    }

    /// Write one entry below `dest_path`, creating directories as needed
    fn extract_entry(mut entry: zip::read::ZipFile, dest_path: &Path) -> Result<Option<PathBuf>> {
        let file_path = match entry.enclosed_name() {
            Some(path) => dest_path.join(path),
            None => {
                warn!(name = entry.name(), "skipping entry with unsafe path");
                return Ok(None);
            }
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&file_path)?;
            return Ok(None);
        }

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut outfile = std::fs::File::create(&file_path)?;
        std::io::copy(&mut entry, &mut outfile).map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to extract {}: {}",
                file_path.display(),
                e
            )))
        })?;

        Ok(Some(file_path))
    }
}

fn failed(archive_path: &Path, e: zip::result::ZipError) -> Error {
    ExtractionError::Failed {
        archive: archive_path.to_path_buf(),
        reason: format!("failed to read ZIP archive: {}", e),
    }
    .into()
}
