//! File retrieval
//!
//! Two modes:
//! - bundle: the service's pre-built archive of the whole record, verified by
//!   its leading bytes before it is kept
//! - individual: selected files one at a time, owner surface first and the
//!   public surface on any failure
//!
//! Requests run strictly one after another. Output directories are taken as
//! given and created when missing.

mod selection;
pub mod signature;

pub use selection::Selection;

use crate::client::{
    FallbackPolicy, SurfaceFailure, ZenodoClient, failure_from_response, fetch_with_fallback,
};
use crate::config::{DownloadConfig, FileCollisionAction};
use crate::credentials::Credential;
use crate::error::{DownloadError, Error, Result};
use crate::types::{
    BatchReport, BundleDownload, FileEntry, FileListing, FileOutcome, RecordId, RecordSurface,
};
use crate::utils::{self, Destination};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Suffix of files still being written
const PARTIAL_SUFFIX: &str = ".part";

/// How much of a rejected bundle is read back for the error message
const ERROR_PAYLOAD_LIMIT: usize = 8 * 1024;

/// Downloads bundles and individual files of a record
#[derive(Clone, Debug)]
pub struct DownloadEngine {
    client: ZenodoClient,
    file_collision: FileCollisionAction,
    check_disk_space: bool,
}

impl DownloadEngine {
    /// Create an engine from the download section of the configuration
    pub fn new(client: ZenodoClient, config: &DownloadConfig) -> Self {
        Self {
            client,
            file_collision: config.file_collision,
            check_disk_space: config.check_disk_space,
        }
    }

    /// Download the record's archive into `dest`
    ///
    /// The body is streamed to `<name>.part`, checked for an archive signature
    /// and only then renamed to the name from `Content-Disposition` (or
    /// `<record_id>.zip`). Anything else is deleted and reported with the
    /// payload's error text.
    ///
    /// # Errors
    /// - [`DownloadError::VerificationFailed`] for a non-success status or a
    ///   payload that is not an archive
    /// - [`Error::InsufficientSpace`] if the listing does not fit in `dest`
    pub async fn download_bundle(
        &self,
        credential: &Credential,
        listing: &FileListing,
        dest: &Path,
    ) -> Result<BundleDownload> {
        let record_id = listing.record_id;
        self.prepare_destination(dest, listing.total_bytes())?;

        let url = self.client.endpoints().archive(record_id);
        let response = self
            .client
            .get(&url, credential)
            .await
            .map_err(|failure| DownloadError::FileFailed {
                file: format!("archive of record {}", record_id),
                reason: failure.to_string(),
            })?;

        let status = response.status().as_u16();
        let file_name = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(utils::content_disposition_filename)
            .unwrap_or_else(|| format!("{}.zip", record_id));

        let wanted = dest.join(&file_name);
        let final_path = match utils::resolve_destination(&wanted, self.file_collision)? {
            Destination::Write(path) => path,
            Destination::Skip(path) => {
                return Err(DownloadError::FileCollision {
                    path,
                    reason: "file already exists and collision action is skip".to_string(),
                }
                .into());
            }
        };
        let part_path = partial_path(&final_path);

        info!(record_id = %record_id, status, path = %part_path.display(), "downloading archive");
        let bytes = match stream_to_file(response, &part_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_partial(&part_path).await;
                return Err(DownloadError::FileFailed {
                    file: file_name,
                    reason: e.to_string(),
                }
                .into());
            }
        };

        let format = if (200..300).contains(&status) {
            signature::detect_file(&part_path).unwrap_or_else(|e| {
                warn!(path = %part_path.display(), error = %e, "could not read archive head");
                None
            })
        } else {
            None
        };

        let Some(format) = format else {
            let message = error_payload_text(&part_path).await;
            remove_partial(&part_path).await;
            warn!(record_id = %record_id, status, %message, "archive verification failed");
            return Err(DownloadError::VerificationFailed {
                record_id,
                status,
                message,
            }
            .into());
        };

        tokio::fs::rename(&part_path, &final_path).await?;
        info!(
            record_id = %record_id,
            path = %final_path.display(),
            bytes,
            ?format,
            "archive downloaded"
        );

        Ok(BundleDownload {
            path: final_path,
            bytes,
            format,
        })
    }

    /// Download `entries` of `record_id` into `dest`, one after another
    ///
    /// A failing file does not stop the batch. The report lists each file's
    /// outcome; [`BatchReport::ensure_complete`] turns failures into
    /// [`DownloadError::PartialBatchFailure`].
    ///
    /// # Errors
    /// Only for problems with `dest` itself (creation, free space).
    pub async fn download_files(
        &self,
        credential: &Credential,
        record_id: RecordId,
        entries: &[&FileEntry],
        dest: &Path,
    ) -> Result<BatchReport> {
        let required = entries.iter().map(|e| e.size_bytes).sum();
        self.prepare_destination(dest, required)?;

        let mut report = BatchReport::default();
        for (i, entry) in entries.iter().enumerate() {
            debug!(file = %entry.name, position = i + 1, total = entries.len(), "next file");
            let outcome = self.download_one(credential, record_id, entry, dest).await;
            match &outcome {
                FileOutcome::Downloaded { name, surface, path } => {
                    info!(file = %name, %surface, path = %path.display(), "downloaded");
                }
                FileOutcome::Skipped { name, path } => {
                    info!(file = %name, path = %path.display(), "exists, skipped");
                }
                FileOutcome::Failed { name, reason } => {
                    warn!(file = %name, %reason, "download failed");
                }
            }
            report.outcomes.push(outcome);
        }

        Ok(report)
    }

    async fn download_one(
        &self,
        credential: &Credential,
        record_id: RecordId,
        entry: &FileEntry,
        dest: &Path,
    ) -> FileOutcome {
        let failed = |reason: String| FileOutcome::Failed {
            name: entry.name.clone(),
            reason,
        };

        let Some(local_name) = utils::local_file_name(&entry.name) else {
            return failed("file name is not usable as a local path".to_string());
        };
        let path = match utils::resolve_destination(&dest.join(local_name), self.file_collision) {
            Ok(Destination::Write(path)) => path,
            Ok(Destination::Skip(path)) => {
                return FileOutcome::Skipped {
                    name: entry.name.clone(),
                    path,
                };
            }
            Err(e) => return failed(e.to_string()),
        };
        let part_path = partial_path(&path);

        let fetched = fetch_with_fallback(
            &RecordSurface::FALLBACK_ORDER,
            FallbackPolicy::AnyFailure,
            |surface| self.fetch_content(surface, credential, record_id, &entry.name, &part_path),
        )
        .await;

        match fetched {
            Ok((surface, bytes)) => {
                if let Err(e) = tokio::fs::rename(&part_path, &path).await {
                    remove_partial(&part_path).await;
                    return failed(format!("could not move into place: {}", e));
                }
                debug!(file = %entry.name, bytes, "file complete");
                FileOutcome::Downloaded {
                    name: entry.name.clone(),
                    surface,
                    path,
                }
            }
            Err(exhausted) => failed(exhausted.summary()),
        }
    }

    async fn fetch_content(
        &self,
        surface: RecordSurface,
        credential: &Credential,
        record_id: RecordId,
        name: &str,
        part_path: &Path,
    ) -> std::result::Result<u64, SurfaceFailure> {
        let url = self.client.endpoints().content(surface, record_id, name);
        let response = self.client.get(&url, credential).await?;
        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }

        let status = response.status().as_u16();
        match stream_to_file(response, part_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                remove_partial(part_path).await;
                Err(SurfaceFailure::failed(Some(status), e.to_string()))
            }
        }
    }

    fn prepare_destination(&self, dest: &Path, required: u64) -> Result<()> {
        if self.check_disk_space {
            utils::ensure_space(dest, required)?;
        }
        std::fs::create_dir_all(dest).map_err(|e| {
            Error::Download(DownloadError::InvalidPath {
                path: dest.to_path_buf(),
                reason: format!("cannot create output directory: {}", e),
            })
        })
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Write the response body to `path` chunk by chunk
async fn stream_to_file(mut response: reqwest::Response, path: &Path) -> std::io::Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;

    while let Some(chunk) = response.chunk().await.map_err(std::io::Error::other)? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove partial file"),
    }
}

/// Error text of a rejected payload: its JSON `message`, else the raw text
async fn error_payload_text(path: &Path) -> String {
    let Ok(bytes) = tokio::fs::read(path).await else {
        return "unreadable response body".to_string();
    };
    let head = &bytes[..bytes.len().min(ERROR_PAYLOAD_LIMIT)];
    let text = String::from_utf8_lossy(head);

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text)
        && let Some(message) = value.get("message").and_then(|m| m.as_str())
    {
        return message.to_string();
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}
