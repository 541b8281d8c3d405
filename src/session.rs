//! One record and one credential for the lifetime of a run
//!
//! A [`Session`] owns the resolved [`Credential`] and lends it to the record
//! resolver and the download engine. Dropping the session drops the token.

use crate::client::ZenodoClient;
use crate::config::Config;
use crate::credentials::{Credential, CredentialResolver, CredentialStore};
use crate::download::{DownloadEngine, Selection, signature};
use crate::error::Result;
use crate::extraction::{Extracted, Extractor, ToolReport};
use crate::prompt::Prompter;
use crate::record::RecordResolver;
use crate::types::{
    ArchiveType, BatchReport, BundleDownload, CredentialSource, FileListing, RecordId,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Archives that were extracted, and those that could not be
#[derive(Debug, Default)]
pub struct ExtractionSummary {
    /// Successful extractions
    pub extracted: Vec<Extracted>,
    /// Archive path and failure message
    pub failed: Vec<(PathBuf, String)>,
}

impl ExtractionSummary {
    fn record(&mut self, archive: &Path, result: Result<Extracted>) {
        match result {
            Ok(extracted) => self.extracted.push(extracted),
            Err(e) => {
                warn!(archive = %archive.display(), error = %e, "extraction failed");
                self.failed.push((archive.to_path_buf(), e.to_string()));
            }
        }
    }
}

/// Result of [`Session::download_all`]
#[derive(Debug)]
pub struct BundleOutcome {
    /// Listing the bundle was checked against
    pub listing: FileListing,
    /// The verified archive
    pub bundle: BundleDownload,
    /// Extraction results, when extraction is enabled
    pub extraction: Option<ExtractionSummary>,
}

/// Result of [`Session::download_selected`]
#[derive(Debug)]
pub struct SelectionOutcome {
    /// Per-file outcomes
    pub report: BatchReport,
    /// Extraction results for downloaded archives, when extraction is enabled
    pub extraction: Option<ExtractionSummary>,
}

/// Authenticated access to one record
#[derive(Debug)]
pub struct Session {
    record_id: RecordId,
    credential: Credential,
    source: CredentialSource,
    records: RecordResolver,
    engine: DownloadEngine,
    extractor: Extractor,
    store: CredentialStore,
    output_dir: PathBuf,
    extract: bool,
}

impl Session {
    /// Resolve a credential for `record_id` and open a session
    ///
    /// # Errors
    /// Credential errors from [`CredentialResolver::resolve`], all fatal.
    pub async fn open(
        config: &Config,
        record_id: RecordId,
        prompter: &mut dyn Prompter,
    ) -> Result<Self> {
        let client = ZenodoClient::new(&config.api)?;
        let resolver = CredentialResolver::new(&config.credentials, client.clone());
        let (credential, source) = resolver.resolve(record_id, prompter).await?;
        info!(%record_id, %source, token_len = credential.len(), "session opened");

        Ok(Self::with_credential(config, client, record_id, credential, source))
    }

    /// Open a session with an already resolved credential
    pub fn with_credential(
        config: &Config,
        client: ZenodoClient,
        record_id: RecordId,
        credential: Credential,
        source: CredentialSource,
    ) -> Self {
        Self {
            record_id,
            credential,
            source,
            records: RecordResolver::new(client.clone()),
            engine: DownloadEngine::new(client, &config.download),
            extractor: Extractor::new(&config.extraction),
            store: CredentialStore::from_config(&config.credentials),
            output_dir: config.download.output_dir.clone(),
            extract: config.extraction.enabled,
        }
    }

    /// Record this session works on
    pub fn record_id(&self) -> RecordId {
        self.record_id
    }

    /// Where the credential came from
    pub fn source(&self) -> &CredentialSource {
        &self.source
    }

    /// Current output directory
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Change the output directory for later downloads
    pub fn set_output_dir(&mut self, dir: PathBuf) {
        info!(dir = %dir.display(), "output directory changed");
        self.output_dir = dir;
    }

    /// Whether downloaded archives are extracted
    pub fn extract_enabled(&self) -> bool {
        self.extract
    }

    /// Turn extraction on or off
    pub fn set_extract(&mut self, extract: bool) {
        self.extract = extract;
    }

    /// Fetch a fresh file listing
    pub async fn list(&self) -> Result<FileListing> {
        self.records
            .resolve_listing(&self.credential, self.record_id)
            .await
    }

    /// Download the record's bundle archive and optionally extract it
    pub async fn download_all(&self) -> Result<BundleOutcome> {
        let listing = self.list().await?;
        let bundle = self
            .engine
            .download_bundle(&self.credential, &listing, &self.output_dir)
            .await?;

        let extraction = if self.extract {
            let mut summary = ExtractionSummary::default();
            let result = self.extractor.extract(&bundle.path).await;
            summary.record(&bundle.path, result);
            Some(summary)
        } else {
            None
        };

        Ok(BundleOutcome {
            listing,
            bundle,
            extraction,
        })
    }

    /// Download the entries of `listing` picked by `selection`
    ///
    /// Per-file failures are in the report; use
    /// [`BatchReport::ensure_complete`] to turn them into an error. With
    /// extraction enabled, every downloaded file with an archive signature is
    /// extracted next to itself.
    ///
    /// # Errors
    /// - [`crate::error::DownloadError::NoMatch`] if the selection is empty
    /// - destination errors (creation, free space)
    pub async fn download_selected(
        &self,
        listing: &FileListing,
        selection: &Selection,
    ) -> Result<SelectionOutcome> {
        let entries = selection.apply(listing)?;
        info!(
            record_id = %self.record_id,
            %selection,
            files = entries.len(),
            "downloading selection"
        );

        let report = self
            .engine
            .download_files(&self.credential, self.record_id, &entries, &self.output_dir)
            .await?;

        let extraction = if self.extract {
            Some(self.extract_downloaded(&report).await)
        } else {
            None
        };

        Ok(SelectionOutcome { report, extraction })
    }

    async fn extract_downloaded(&self, report: &BatchReport) -> ExtractionSummary {
        let mut summary = ExtractionSummary::default();
        for path in report.downloaded() {
            match signature::detect_file(path) {
                Ok(Some(ArchiveType::Rar)) | Ok(None) => continue,
                Ok(Some(_)) => {
                    let result = self.extractor.extract(path).await;
                    summary.record(path, result);
                }
                Err(e) => summary.record(path, Err(e.into())),
            }
        }
        summary
    }

    /// Delete stored token files; the active credential stays usable
    pub fn forget_token(&self) -> Result<usize> {
        self.store.remove()
    }

    /// Report which external extraction tools are present
    pub fn check_tools(&self) -> ToolReport {
        self.extractor.check_tools()
    }
}
