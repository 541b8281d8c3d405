//! HTTP access to the repository API
//!
//! [`ZenodoClient`] wraps a configured `reqwest::Client` with the endpoint
//! templates for both surfaces. Every request carries the caller's
//! [`Credential`] as a bearer token; the client itself never stores it.

mod endpoints;
mod fallback;

pub use endpoints::Endpoints;
pub use fallback::{FallbackExhausted, FallbackPolicy, SurfaceFailure, fetch_with_fallback};
pub(crate) use fallback::success_body_not_found;

use crate::config::ApiConfig;
use crate::credentials::Credential;
use crate::error::Result;
use tracing::trace;

/// Configured HTTP client for one API base URL
#[derive(Clone, Debug)]
pub struct ZenodoClient {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl ZenodoClient {
    /// Build a client from the API section of the configuration
    ///
    /// # Errors
    /// Returns error if the underlying HTTP client cannot be created
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            endpoints: Endpoints::new(config.base_url.clone()),
        })
    }

    /// URL templates for this client's base
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Authenticated GET; transport errors are reported as [`SurfaceFailure`]
    pub async fn get(
        &self,
        url: &str,
        credential: &Credential,
    ) -> std::result::Result<reqwest::Response, SurfaceFailure> {
        trace!(url, "GET");
        self.http
            .get(url)
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(|e| SurfaceFailure::failed(None, describe_transport_error(&e)))
    }
}

/// Consume a non-success response into a classified failure
pub async fn failure_from_response(response: reqwest::Response) -> SurfaceFailure {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    SurfaceFailure::from_response(status, &body)
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}
