//! Error types for zenodo-dl
//!
//! This module provides the error taxonomy for the library:
//! - Credential-layer errors (missing, invalid, too many passphrase attempts) which end the process
//! - Record and download errors which are local to the requested operation
//! - Context information (surface, HTTP status, file name, record ID)

use crate::types::{RecordId, RecordSurface};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for zenodo-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for zenodo-dl
///
/// Each variant carries enough context (surface, status, file) for a user to
/// diagnose the failure without reading internal logs.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api.base_url")
        key: Option<String>,
    },

    /// Credential resolution, storage or validation failed
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Record lookup failed
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Download-related error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Archive extraction failed
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Record identifier did not match the required numeric pattern
    #[error("invalid record ID {input:?}: expected a positive integer")]
    InvalidRecordId {
        /// The rejected input
        input: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be set up
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Insufficient disk space
    #[error("insufficient disk space: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        /// Number of bytes required for the operation
        required: u64,
        /// Number of bytes currently available on disk
        available: u64,
    },

    /// Failed to check disk space
    #[error("failed to check disk space: {0}")]
    DiskSpaceCheckFailed(String),

    /// External tool execution failed (tar, etc.)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation interrupted by the user
    #[error("interrupted")]
    Interrupted,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Credential-layer errors
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No token from any source and the interactive entry was empty
    #[error("no access token available: set the environment variable or enter a token")]
    Missing,

    /// The validation probe returned something other than 200
    #[error(
        "access token rejected for record {record_id} (HTTP {status}); check the token scopes, expiry and the record ID"
    )]
    Invalid {
        /// Record the probe was issued against
        record_id: RecordId,
        /// HTTP status returned by the probe
        status: u16,
    },

    /// Retry limit reached for the encrypted store
    #[error("too many wrong passphrase attempts ({attempts}) for {path}")]
    TooManyAttempts {
        /// The encrypted store that could not be decrypted
        path: PathBuf,
        /// Number of attempts made
        attempts: u32,
    },

    /// Encrypted store contents are not a valid blob
    #[error("corrupt encrypted token file {path}: {reason}")]
    CorruptStore {
        /// The encrypted store
        path: PathBuf,
        /// Why the blob was rejected
        reason: String,
    },

    /// Store file permissions could not be restricted to the owner
    #[error("failed to restrict permissions on {path}: {reason}")]
    Permissions {
        /// The store file
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// Encryption primitive failure
    #[error("encryption failed: {0}")]
    Crypto(String),
}

/// Record lookup errors
#[derive(Debug, Error)]
pub enum RecordError {
    /// Neither surface returned a usable listing
    #[error(
        "record {record_id} not found (owner surface: {}, public surface: {})",
        describe_status(*owner_status),
        describe_status(*public_status)
    )]
    NotFound {
        /// The record that was looked up
        record_id: RecordId,
        /// Status returned by the owner surface, `None` for an empty response
        owner_status: Option<u16>,
        /// Status returned by the public surface, `None` for an empty response
        public_status: Option<u16>,
    },

    /// A surface answered with a failure that does not permit fallback
    #[error("{surface} surface returned HTTP {status} for record {record_id}: {message}")]
    SurfaceFailed {
        /// The record that was looked up
        record_id: RecordId,
        /// Which surface failed
        surface: RecordSurface,
        /// HTTP status
        status: u16,
        /// Error text from the response body
        message: String,
    },

    /// A surface could not be reached at all
    #[error("{surface} surface unreachable for record {record_id}: {message}")]
    Unreachable {
        /// The record that was looked up
        record_id: RecordId,
        /// Which surface failed
        surface: RecordSurface,
        /// Transport error text
        message: String,
    },

    /// Metadata response could not be interpreted
    #[error("malformed metadata from {surface} surface for record {record_id}: {reason}")]
    Malformed {
        /// The record that was looked up
        record_id: RecordId,
        /// Which surface answered
        surface: RecordSurface,
        /// What was wrong with the document
        reason: String,
    },
}

/// Download-related errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Bundle payload was not an archive
    #[error("bundle for record {record_id} is not an archive (HTTP {status}): {message}")]
    VerificationFailed {
        /// The record whose bundle was requested
        record_id: RecordId,
        /// HTTP status of the archive response
        status: u16,
        /// Error payload text returned instead of the archive
        message: String,
    },

    /// Some files of a batch failed
    #[error("{failed} of {total} files failed to download")]
    PartialBatchFailure {
        /// Number of files that failed
        failed: usize,
        /// Number of files attempted
        total: usize,
    },

    /// A selection matched nothing
    #[error("selection {selection:?} matched no files")]
    NoMatch {
        /// The user-supplied selection
        selection: String,
    },

    /// A single file could not be fetched from any surface
    #[error("failed to download {file}: {reason}")]
    FileFailed {
        /// File name
        file: String,
        /// Per-surface failure summary
        reason: String,
    },

    /// File collision at destination
    #[error("file collision at {path}: {reason}")]
    FileCollision {
        /// The path where the collision occurred
        path: PathBuf,
        /// The reason for the collision (e.g., "file already exists")
        reason: String,
    },

    /// Invalid output path
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The invalid path that was encountered
        path: PathBuf,
        /// The reason the path is invalid
        reason: String,
    },
}

/// Archive extraction errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Format not recognised from the file signature
    #[error("unsupported archive format for {archive}")]
    UnknownFormat {
        /// The file that was inspected
        archive: PathBuf,
    },

    /// Extraction failed
    #[error("extraction failed for {archive}: {reason}")]
    Failed {
        /// The archive file that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },
}

fn describe_status(status: Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {code}"),
        None => "empty response".to_string(),
    }
}

impl Error {
    /// Whether this error must end the process rather than return to the menu.
    ///
    /// Credential-layer failures are fatal, and so is input that was closed or
    /// interrupted with Ctrl-C. Listing and download failures are local to the
    /// operation that raised them.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Credential(_) | Error::Config { .. } | Error::Interrupted => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Interrupted => 130,
            Error::Io(e) if e.kind() == std::io::ErrorKind::Interrupted => 130,
            Error::Credential(_) => 2,
            Error::Config { .. } | Error::InvalidRecordId { .. } => 64,
            _ => 1,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config {
            message: e.to_string(),
            key: None,
        }
    }
}
