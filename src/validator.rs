//! Credential probe
//!
//! One request against the owner-surface metadata endpoint. 200 is the only
//! success; everything else is an invalid credential for this record. There is
//! no retry, repeated bad requests against the service are not wanted.

use crate::client::ZenodoClient;
use crate::credentials::Credential;
use crate::error::{RecordError, Result};
use crate::types::{RecordId, RecordSurface};
use tracing::{debug, warn};

/// Outcome of a probe
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validation {
    /// The probe returned HTTP 200
    Valid,
    /// The probe returned this status instead
    Invalid(u16),
}

impl Validation {
    /// Whether the credential may be used and saved
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }
}

/// Probe `record_id` with `credential`
///
/// # Errors
/// Returns [`RecordError::Unreachable`] if the request could not be sent.
pub async fn validate(
    client: &ZenodoClient,
    credential: &Credential,
    record_id: RecordId,
) -> Result<Validation> {
    let url = client.endpoints().metadata(RecordSurface::Owner, record_id);
    let response = client
        .get(&url, credential)
        .await
        .map_err(|failure| RecordError::Unreachable {
            record_id,
            surface: RecordSurface::Owner,
            message: failure.message,
        })?;

    let status = response.status().as_u16();
    if status == 200 {
        debug!(record_id = %record_id, "access token accepted");
        Ok(Validation::Valid)
    } else {
        warn!(record_id = %record_id, status, "access token rejected");
        Ok(Validation::Invalid(status))
    }
}
