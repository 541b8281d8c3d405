//! Ordered surface fallback
//!
//! Both metadata and file content may live on either surface. Callers supply
//! one attempt per surface; [`fetch_with_fallback`] runs them in order and
//! decides, per [`FallbackPolicy`], whether a failure moves on to the next
//! surface or ends the lookup.

use crate::types::RecordSurface;
use std::future::Future;
use tracing::debug;

/// When a failed attempt may fall through to the next surface
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Only a not-found-shaped response (404, empty body, `"status": 404`)
    NotFoundOnly,
    /// Any failure, including transport errors
    AnyFailure,
}

/// One failed attempt against one surface
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurfaceFailure {
    /// HTTP status, `None` for transport errors and empty responses
    pub status: Option<u16>,
    /// Whether the response means "not on this surface"
    pub not_found: bool,
    /// Error text for the user
    pub message: String,
}

impl SurfaceFailure {
    /// A response that means the resource is not on this surface
    pub fn not_found(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            not_found: true,
            message: message.into(),
        }
    }

    /// Any other failure
    pub fn failed(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            not_found: false,
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP response from its status and body
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = error_message(body).unwrap_or_else(|| canonical_reason(status));
        if status == 404 || body.trim().is_empty() || body_status(body) == Some(404) {
            Self::not_found(Some(status), message)
        } else {
            Self::failed(Some(status), message)
        }
    }
}

impl std::fmt::Display for SurfaceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {status}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Every attempt failed, or a failure was not eligible for fallback
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FallbackExhausted {
    /// Attempts in the order they were made
    pub attempts: Vec<(RecordSurface, SurfaceFailure)>,
}

impl FallbackExhausted {
    /// Failure recorded for `surface`, if it was tried
    pub fn failure(&self, surface: RecordSurface) -> Option<&SurfaceFailure> {
        self.attempts
            .iter()
            .find(|(s, _)| *s == surface)
            .map(|(_, f)| f)
    }

    /// The attempt that ended the lookup
    pub fn last(&self) -> Option<&(RecordSurface, SurfaceFailure)> {
        self.attempts.last()
    }

    /// `owner: HTTP 404: ...; public: HTTP 403: ...`
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|(surface, failure)| format!("{surface}: {failure}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Try `attempt` on each surface in order until one succeeds
///
/// Returns the surface that answered together with its result. A failure that
/// `policy` does not allow to fall through stops the lookup immediately.
pub async fn fetch_with_fallback<T, F, Fut>(
    surfaces: &[RecordSurface],
    policy: FallbackPolicy,
    mut attempt: F,
) -> Result<(RecordSurface, T), FallbackExhausted>
where
    F: FnMut(RecordSurface) -> Fut,
    Fut: Future<Output = Result<T, SurfaceFailure>>,
{
    let mut attempts = Vec::with_capacity(surfaces.len());

    for &surface in surfaces {
        match attempt(surface).await {
            Ok(value) => return Ok((surface, value)),
            Err(failure) => {
                let may_continue = match policy {
                    FallbackPolicy::NotFoundOnly => failure.not_found,
                    FallbackPolicy::AnyFailure => true,
                };
                debug!(%surface, %failure, may_continue, "surface attempt failed");
                attempts.push((surface, failure));
                if !may_continue {
                    break;
                }
            }
        }
    }

    Err(FallbackExhausted { attempts })
}

fn canonical_reason(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unexpected status")
        .to_string()
}

/// `message` field of a JSON error body
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// `status` field of a JSON error body, as number or string
fn body_status(body: &str) -> Option<u16> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("status")? {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Classify a 2xx metadata body: empty or carrying `"status": 404` is not-found
pub(crate) fn success_body_not_found(body: &str) -> Option<SurfaceFailure> {
    if body.trim().is_empty() {
        return Some(SurfaceFailure::not_found(None, "empty response"));
    }
    if body_status(body) == Some(404) {
        let message = error_message(body).unwrap_or_else(|| "not found".to_string());
        return Some(SurfaceFailure::not_found(Some(404), message));
    }
    None
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    const ORDER: [RecordSurface; 2] = RecordSurface::FALLBACK_ORDER;

    #[tokio::test]
    async fn first_success_wins_without_trying_the_rest() {
        let tried = RefCell::new(Vec::new());
        let result = fetch_with_fallback(&ORDER, FallbackPolicy::NotFoundOnly, |s| {
            tried.borrow_mut().push(s);
            async move { Ok::<_, SurfaceFailure>(s) }
        })
        .await
        .unwrap();

        assert_eq!(result, (RecordSurface::Owner, RecordSurface::Owner));
        assert_eq!(*tried.borrow(), [RecordSurface::Owner]);
    }

    #[tokio::test]
    async fn not_found_falls_through_under_both_policies() {
        for policy in [FallbackPolicy::NotFoundOnly, FallbackPolicy::AnyFailure] {
            let (surface, value) = fetch_with_fallback(&ORDER, policy, |s| async move {
                match s {
                    RecordSurface::Owner => Err(SurfaceFailure::not_found(Some(404), "gone")),
                    RecordSurface::Public => Ok("public body"),
                }
            })
            .await
            .unwrap();
            assert_eq!(surface, RecordSurface::Public);
            assert_eq!(value, "public body");
        }
    }

    #[tokio::test]
    async fn other_failures_stop_under_not_found_only() {
        let err = fetch_with_fallback(&ORDER, FallbackPolicy::NotFoundOnly, |s| async move {
            match s {
                RecordSurface::Owner => Err(SurfaceFailure::failed(Some(500), "boom")),
                RecordSurface::Public => Ok(()),
            }
        })
        .await
        .unwrap_err();

        assert_eq!(err.attempts.len(), 1);
        assert_eq!(err.last().unwrap().0, RecordSurface::Owner);
    }

    #[tokio::test]
    async fn other_failures_fall_through_under_any_failure() {
        let (surface, ()) =
            fetch_with_fallback(&ORDER, FallbackPolicy::AnyFailure, |s| async move {
                match s {
                    RecordSurface::Owner => Err(SurfaceFailure::failed(None, "connection reset")),
                    RecordSurface::Public => Ok(()),
                }
            })
            .await
            .unwrap();
        assert_eq!(surface, RecordSurface::Public);
    }

    #[tokio::test]
    async fn exhausted_lists_every_attempt() {
        let err = fetch_with_fallback(&ORDER, FallbackPolicy::AnyFailure, |s| async move {
            Err::<(), _>(SurfaceFailure::failed(Some(403), format!("{s} denied")))
        })
        .await
        .unwrap_err();

        assert_eq!(err.attempts.len(), 2);
        assert_eq!(
            err.summary(),
            "owner: HTTP 403: owner denied; public: HTTP 403: public denied"
        );
        assert!(err.failure(RecordSurface::Public).is_some());
    }

    #[test]
    fn classifies_error_bodies() {
        let f = SurfaceFailure::from_response(
            404,
            r#"{"status": 404, "message": "PID does not exist."}"#,
        );
        assert!(f.not_found);
        assert_eq!(f.message, "PID does not exist.");

        let f = SurfaceFailure::from_response(410, r#"{"status": "404", "message": "gone"}"#);
        assert!(f.not_found);

        let f = SurfaceFailure::from_response(401, r#"{"status": 401, "message": "no"}"#);
        assert!(!f.not_found);
        assert_eq!(f.status, Some(401));

        let f = SurfaceFailure::from_response(502, "<html>bad gateway</html>");
        assert!(!f.not_found);
        assert_eq!(f.message, "Bad Gateway");
    }

    #[test]
    fn success_bodies_that_mean_not_found() {
        assert!(success_body_not_found("").is_some());
        assert!(success_body_not_found("  \n").is_some());
        assert!(success_body_not_found(r#"{"status": 404, "message": "x"}"#).is_some());
        assert!(success_body_not_found(r#"{"files": []}"#).is_none());
    }
}
