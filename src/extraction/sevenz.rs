use super::{collect_files, ensure_contained};
use crate::error::{ExtractionError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Archive extractor for 7z files
pub struct SevenZipExtractor;

impl SevenZipExtractor {
    /// Extract `archive_path` into `dest_path`
    ///
    /// The result is checked for entries resolving outside `dest_path`.
    pub fn extract(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "attempting 7z extraction");

        std::fs::create_dir_all(dest_path)?;

        sevenz_rust::decompress_file(archive_path, dest_path).map_err(|e| {
            ExtractionError::Failed {
                archive: archive_path.to_path_buf(),
                reason: format!("failed to extract 7z archive: {}", e),
            }
        })?;

        ensure_contained(dest_path, archive_path)?;
        let extracted_files = collect_files(dest_path)?;

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "7z extraction successful"
        );
        Ok(extracted_files)
    }
}
