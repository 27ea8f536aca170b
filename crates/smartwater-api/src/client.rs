// Smart Water cloud HTTP client
//
// Wraps `reqwest::Client` with URL construction, bearer-token injection
// and status classification. Endpoint methods live in `devices.rs` as
// inherent methods so this module stays focused on transport mechanics.

use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::auth::Session;
use crate::error::ApiError;
use crate::transport::TransportConfig;

/// Raw HTTP client for discovery and reading retrieval.
///
/// Every request is authorized with the token of the `Session` passed by
/// the caller; the client itself holds no credentials.
pub struct SmartWaterClient {
    http: reqwest::Client,
    base_url: Url,
    max_concurrent: usize,
}

impl SmartWaterClient {
    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            max_concurrent: TransportConfig::default().concurrency(),
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub(crate) fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Authorized GET, decoded as `T`.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
    ) -> Result<T, ApiError> {
        let url = endpoint(&self.base_url, path)?;
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .bearer_auth(session.token().expose_secret())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(classify_status(status, &resp, path));
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Deserialization {
            message: format!("{e} (body preview: {})", body_preview(&body)),
            body,
        })
    }
}

// ── Status classification ────────────────────────────────────────────

fn classify_status(status: StatusCode, resp: &reqwest::Response, path: &str) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized,
        StatusCode::NOT_FOUND => ApiError::NotFound {
            resource: path.to_owned(),
        },
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited {
            retry_after_secs: resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok()),
        },
        s if s.is_server_error() || s == StatusCode::REQUEST_TIMEOUT => ApiError::Transient {
            message: format!("HTTP {s} from {path}"),
        },
        s => ApiError::Http {
            status: s.as_u16(),
            message: s.canonical_reason().unwrap_or("unexpected status").to_owned(),
        },
    }
}

// ── URL builders ─────────────────────────────────────────────────────

/// Append `path` to `base`, keeping any path prefix `base` already has.
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let base = base.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Url::parse(&format!("{base}/{path}"))
}

/// First 200 characters of a response body, for error messages.
pub(crate) fn body_preview(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
