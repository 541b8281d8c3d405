//! tar-family archives via the system `tar` binary

use super::{collect_files, ensure_contained};
use crate::error::{Error, ExtractionError, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Extracts tar, tar.gz, tar.bz2, tar.xz and tar.zst with an external `tar`
///
/// Compression is left to `tar` itself (`-xf` auto-detects it).
#[derive(Clone, Debug)]
pub struct TarExtractor {
    binary_path: PathBuf,
}

impl TarExtractor {
    /// Use the `tar` at `binary_path`
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Find `tar` in PATH
    pub fn from_path() -> Option<Self> {
        which::which("tar").ok().map(Self::new)
    }

    /// Path of the executable in use
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Extract `archive_path` into `dest_path`
    pub async fn extract(&self, archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        debug!(binary = %self.binary_path.display(), ?archive_path, ?dest_path, "running tar");

        tokio::fs::create_dir_all(dest_path).await?;

        let output = Command::new(&self.binary_path)
            .arg("-xf")
            .arg(archive_path)
            .arg("-C")
            .arg(dest_path)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("failed to execute tar: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Failed {
                archive: archive_path.to_path_buf(),
                reason: format!("tar exited with {}: {}", output.status, stderr.trim()),
            }
            .into());
        }

        ensure_contained(dest_path, archive_path)?;
        let extracted_files = collect_files(dest_path)?;

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "tar extraction successful"
        );
        Ok(extracted_files)
    }
}
