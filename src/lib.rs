//! # zenodo-dl
//!
//! Downloader for files attached to Zenodo records: published, access
//! restricted and unpublished drafts alike.
//!
//! ## Flow
//!
//! 1. A bearer token is resolved from the environment, an encrypted or
//!    plaintext token file, or an interactive prompt ([`credentials`]).
//! 2. Tokens entered at the prompt are probed once before use ([`validator`]).
//! 3. The record's metadata is looked up on the owner (deposit) surface first
//!    and on the public records surface when the owner surface does not know
//!    the record ([`record`]).
//! 4. Files are fetched either as the service's bundle archive or one at a
//!    time with per-file surface fallback ([`download`]), and optionally
//!    extracted ([`extraction`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use zenodo_dl::config::Config;
//! use zenodo_dl::download::Selection;
//! use zenodo_dl::prompt::TerminalPrompter;
//! use zenodo_dl::session::Session;
//! use zenodo_dl::types::RecordId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let mut prompter = TerminalPrompter::new();
//!     let session = Session::open(&config, RecordId::new(1234567), &mut prompter).await?;
//!
//!     let listing = session.list().await?;
//!     let outcome = session
//!         .download_selected(&listing, &Selection::parse(".csv"))
//!         .await?;
//!     outcome.report.ensure_complete()?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP client, endpoints and surface fallback
pub mod client;
/// Configuration types
pub mod config;
/// Access token resolution and storage
pub mod credentials;
/// Bundle and per-file downloads
pub mod download;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// Interactive menu and text output
pub mod menu;
/// User prompts
pub mod prompt;
/// Record metadata lookup
pub mod record;
/// Authenticated access to one record
pub mod session;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;
/// Token probe
pub mod validator;

// Re-export commonly used types
pub use config::Config;
pub use credentials::{Credential, CredentialResolver, CredentialStore};
pub use error::{CredentialError, DownloadError, Error, ExtractionError, RecordError, Result};
pub use session::Session;
pub use types::{
    BatchReport, CredentialSource, FileEntry, FileListing, FileOutcome, RecordId, RecordSurface,
};
