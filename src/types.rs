//! Core types for zenodo-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;

/// Unique identifier for a Zenodo record
///
/// Parsing is strict: the input must consist of ASCII digits only and name a
/// non-zero value. Signs, whitespace and empty strings are rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Create a new RecordId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<RecordId> for u64 {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidRecordId {
            input: s.to_string(),
        };

        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        match s.parse::<u64>() {
            Ok(0) | Err(_) => Err(invalid()),
            Ok(id) => Ok(Self(id)),
        }
    }
}

/// The two API surfaces a record may be served through
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSurface {
    /// Deposit API: drafts, unpublished and owned records
    Owner,
    /// Records API: published, publicly visible records
    Public,
}

impl RecordSurface {
    /// Surfaces in the order they are tried
    pub const FALLBACK_ORDER: [RecordSurface; 2] = [RecordSurface::Owner, RecordSurface::Public];
}

impl std::fmt::Display for RecordSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordSurface::Owner => write!(f, "owner"),
            RecordSurface::Public => write!(f, "public"),
        }
    }
}

/// Where the active credential came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialSource {
    /// Ambient environment variable
    Environment {
        /// Name of the variable that was read
        var: String,
    },
    /// Encrypted token file
    EncryptedFile {
        /// Path of the store
        path: PathBuf,
    },
    /// Plaintext token file
    PlaintextFile {
        /// Path of the store
        path: PathBuf,
    },
    /// Typed at the prompt
    Interactive,
}

impl CredentialSource {
    /// Only interactively entered tokens are validated and offered for saving
    pub fn offers_save_back(&self) -> bool {
        matches!(self, CredentialSource::Interactive)
    }
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::Environment { var } => write!(f, "environment variable {var}"),
            CredentialSource::EncryptedFile { path } => {
                write!(f, "encrypted file {}", path.display())
            }
            CredentialSource::PlaintextFile { path } => {
                write!(f, "plaintext file {}", path.display())
            }
            CredentialSource::Interactive => write!(f, "interactive entry"),
        }
    }
}

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A file attached to a record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name as published on the record
    pub name: String,
    /// Size in bytes
    pub size_bytes: u64,
}

impl FileEntry {
    /// Create a new entry
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
        }
    }

    /// Size in megabytes rounded to hundredths, for display only
    pub fn size_mb(&self) -> f64 {
        (self.size_bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
    }
}

/// Normalized file listing of one record
///
/// Entries are sorted lexicographically by name and unique by name. A listing
/// is built fresh for every operation and never cached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileListing {
    /// Record the listing belongs to
    pub record_id: RecordId,
    /// Surface that served the metadata
    pub surface: RecordSurface,
    entries: Vec<FileEntry>,
}

impl FileListing {
    /// Build a listing, sorting by name and dropping repeated names
    pub fn new(record_id: RecordId, surface: RecordSurface, mut entries: Vec<FileEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries.dedup_by(|a, b| a.name == b.name);
        Self {
            record_id,
            surface,
            entries,
        }
    }

    /// Sorted entries
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the record has no files
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all file sizes in bytes
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size_bytes).sum()
    }
}

/// Outcome of one file in an individual-mode batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileOutcome {
    /// Written to disk
    Downloaded {
        /// File name
        name: String,
        /// Surface that served the content
        surface: RecordSurface,
        /// Destination path
        path: PathBuf,
    },
    /// Skipped because the destination exists and the collision action is Skip
    Skipped {
        /// File name
        name: String,
        /// Existing path
        path: PathBuf,
    },
    /// Failed on every surface
    Failed {
        /// File name
        name: String,
        /// Per-surface failure summary
        reason: String,
    },
}

impl FileOutcome {
    /// File name of this outcome
    pub fn name(&self) -> &str {
        match self {
            FileOutcome::Downloaded { name, .. }
            | FileOutcome::Skipped { name, .. }
            | FileOutcome::Failed { name, .. } => name,
        }
    }
}

/// Per-file summary of an individual-mode batch
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Outcomes in processing order
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    /// Paths of files written to disk
    pub fn downloaded(&self) -> impl Iterator<Item = &PathBuf> {
        self.outcomes.iter().filter_map(|o| match o {
            FileOutcome::Downloaded { path, .. } => Some(path),
            _ => None,
        })
    }

    /// Number of files that failed on every surface
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Failed { .. }))
            .count()
    }

    /// Turn failures into `PartialBatchFailure`
    pub fn ensure_complete(&self) -> crate::Result<()> {
        let failed = self.failed_count();
        if failed == 0 {
            Ok(())
        } else {
            Err(crate::error::DownloadError::PartialBatchFailure {
                failed,
                total: self.outcomes.len(),
            }
            .into())
        }
    }
}

/// A downloaded bundle archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundleDownload {
    /// Final archive path
    pub path: PathBuf,
    /// Bytes written
    pub bytes: u64,
    /// Detected archive format
    pub format: ArchiveType,
}

/// Archive formats recognised from file signatures
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    /// ZIP (.zip)
    Zip,
    /// 7-Zip (.7z)
    SevenZip,
    /// RAR (.rar)
    Rar,
    /// gzip stream, usually a tarball
    Gzip,
    /// bzip2 stream
    Bzip2,
    /// xz stream
    Xz,
    /// zstd stream
    Zstd,
    /// Uncompressed POSIX tar
    Tar,
}
