//! Record lookup and file listing
//!
//! Metadata is requested from the owner surface first. Only a not-found answer
//! (HTTP 404, an empty body, or a JSON body carrying `"status": 404`) moves on
//! to the public surface; any other owner failure is reported as-is. The
//! answering document is normalized into a [`FileListing`].

use crate::client::{
    FallbackExhausted, FallbackPolicy, SurfaceFailure, ZenodoClient, failure_from_response,
    fetch_with_fallback, success_body_not_found,
};
use crate::credentials::Credential;
use crate::error::{RecordError, Result};
use crate::types::{FileEntry, FileListing, RecordId, RecordSurface};
use serde_json::Value;
use tracing::{debug, info};

/// Resolves which surface serves a record and lists its files
#[derive(Clone, Debug)]
pub struct RecordResolver {
    client: ZenodoClient,
}

impl RecordResolver {
    /// Create a resolver using `client`
    pub fn new(client: ZenodoClient) -> Self {
        Self { client }
    }

    /// Fetch and normalize the file listing of `record_id`
    ///
    /// Each call issues fresh requests; nothing is cached.
    ///
    /// # Errors
    /// - [`RecordError::NotFound`] if both surfaces report not-found
    /// - [`RecordError::SurfaceFailed`] / [`RecordError::Unreachable`] for an
    ///   owner failure that is not a not-found signal
    /// - [`RecordError::Malformed`] if the answering document has no usable file list
    pub async fn resolve_listing(
        &self,
        credential: &Credential,
        record_id: RecordId,
    ) -> Result<FileListing> {
        let (surface, body) = fetch_with_fallback(
            &RecordSurface::FALLBACK_ORDER,
            FallbackPolicy::NotFoundOnly,
            |surface| self.fetch_metadata(surface, credential, record_id),
        )
        .await
        .map_err(|exhausted| lookup_error(record_id, exhausted))?;

        let document: Value =
            serde_json::from_str(&body).map_err(|e| RecordError::Malformed {
                record_id,
                surface,
                reason: format!("invalid JSON: {}", e),
            })?;

        let entries = normalize_files(&document).map_err(|reason| RecordError::Malformed {
            record_id,
            surface,
            reason,
        })?;

        let listing = FileListing::new(record_id, surface, entries);
        info!(
            record_id = %record_id,
            %surface,
            files = listing.len(),
            total_bytes = listing.total_bytes(),
            "resolved record listing"
        );
        Ok(listing)
    }

    async fn fetch_metadata(
        &self,
        surface: RecordSurface,
        credential: &Credential,
        record_id: RecordId,
    ) -> std::result::Result<String, SurfaceFailure> {
        let url = self.client.endpoints().metadata(surface, record_id);
        let response = self.client.get(&url, credential).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(failure_from_response(response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| SurfaceFailure::failed(Some(status.as_u16()), e.to_string()))?;
        if let Some(failure) = success_body_not_found(&body) {
            return Err(failure);
        }
        debug!(record_id = %record_id, %surface, bytes = body.len(), "fetched metadata");
        Ok(body)
    }
}

fn lookup_error(record_id: RecordId, exhausted: FallbackExhausted) -> crate::Error {
    let Some((surface, failure)) = exhausted.last().cloned() else {
        return RecordError::NotFound {
            record_id,
            owner_status: None,
            public_status: None,
        }
        .into();
    };

    if failure.not_found {
        let status_of = |s| exhausted.failure(s).and_then(|f| f.status);
        return RecordError::NotFound {
            record_id,
            owner_status: status_of(RecordSurface::Owner),
            public_status: status_of(RecordSurface::Public),
        }
        .into();
    }

    match failure.status {
        Some(status) => RecordError::SurfaceFailed {
            record_id,
            surface,
            status,
            message: failure.message,
        }
        .into(),
        None => RecordError::Unreachable {
            record_id,
            surface,
            message: failure.message,
        }
        .into(),
    }
}

/// Extract `(name, size)` pairs from either metadata shape
///
/// Deposit documents carry `files: [{filename, filesize}]`; record documents
/// carry `files: [{key, size}]` or `files: {entries: {name: {key, size}}}`.
fn normalize_files(document: &Value) -> std::result::Result<Vec<FileEntry>, String> {
    let files = document
        .get("files")
        .ok_or_else(|| "document has no \"files\" field".to_string())?;

    match files {
        Value::Array(items) => items.iter().map(|item| file_entry(item, None)).collect(),
        Value::Object(map) => match map.get("entries") {
            Some(Value::Object(entries)) => entries
                .iter()
                .map(|(key, item)| file_entry(item, Some(key)))
                .collect(),
            Some(Value::Array(items)) => items.iter().map(|item| file_entry(item, None)).collect(),
            // Files disabled or not yet listed
            None => Ok(Vec::new()),
            Some(other) => Err(format!("unexpected \"entries\" value: {}", type_name(other))),
        },
        other => Err(format!("unexpected \"files\" value: {}", type_name(other))),
    }
}

fn file_entry(item: &Value, map_key: Option<&String>) -> std::result::Result<FileEntry, String> {
    let name = ["filename", "key"]
        .iter()
        .find_map(|field| item.get(*field).and_then(Value::as_str))
        .or(map_key.map(String::as_str))
        .ok_or_else(|| "file entry without a name".to_string())?;

    let size = ["filesize", "size"]
        .iter()
        .find_map(|field| item.get(*field).and_then(as_byte_count))
        .unwrap_or(0);

    Ok(FileEntry::new(name, size))
}

fn as_byte_count(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
