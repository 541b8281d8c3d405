//! URL templates for the two API surfaces

use crate::types::{RecordId, RecordSurface};

/// Builds request URLs from the configured base
#[derive(Clone, Debug)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    /// `base` is the API root, e.g. `https://zenodo.org/api`
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// API root without trailing slash
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Record metadata on the given surface
    pub fn metadata(&self, surface: RecordSurface, record_id: RecordId) -> String {
        match surface {
            RecordSurface::Owner => format!("{}/deposit/depositions/{}", self.base, record_id),
            RecordSurface::Public => format!("{}/records/{}", self.base, record_id),
        }
    }

    /// Raw content of one file on the given surface
    pub fn content(&self, surface: RecordSurface, record_id: RecordId, file: &str) -> String {
        let file = urlencoding::encode(file);
        match surface {
            RecordSurface::Owner => format!(
                "{}/records/{}/draft/files/{}/content",
                self.base, record_id, file
            ),
            RecordSurface::Public => {
                format!("{}/records/{}/files/{}/content", self.base, record_id, file)
            }
        }
    }

    /// Pre-built archive of every file of a record
    pub fn archive(&self, record_id: RecordId) -> String {
        format!("{}/records/{}/files-archive", self.base, record_id)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_urls_per_surface() {
        let e = Endpoints::new("https://zenodo.org/api/");
        let id = RecordId::new(123);
        assert_eq!(
            e.metadata(RecordSurface::Owner, id),
            "https://zenodo.org/api/deposit/depositions/123"
        );
        assert_eq!(
            e.metadata(RecordSurface::Public, id),
            "https://zenodo.org/api/records/123"
        );
    }

    #[test]
    fn content_urls_percent_encode_file_names() {
        let e = Endpoints::new("https://zenodo.org/api");
        let id = RecordId::new(9);
        assert_eq!(
            e.content(RecordSurface::Owner, id, "data set#1.csv"),
            "https://zenodo.org/api/records/9/draft/files/data%20set%231.csv/content"
        );
        assert_eq!(
            e.content(RecordSurface::Public, id, "a.zip"),
            "https://zenodo.org/api/records/9/files/a.zip/content"
        );
    }

    #[test]
    fn archive_url() {
        let e = Endpoints::new("http://127.0.0.1:8080");
        assert_eq!(
            e.archive(RecordId::new(5)),
            "http://127.0.0.1:8080/records/5/files-archive"
        );
    }
}
