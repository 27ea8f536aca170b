use thiserror::Error;

/// Failure of a login exchange.
///
/// `Unauthorized` is user-correctable and must never be retried blindly;
/// `Transient` covers everything the caller may retry on a later attempt.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Credentials were rejected (wrong password, unknown account, empty input).
    #[error("Authentication rejected: {message}")]
    Unauthorized { message: String },

    /// Network failure, timeout, or a server-side error during login.
    #[error("Authentication temporarily unavailable: {message}")]
    Transient { message: String },
}

impl AuthError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transient {
            message: err.to_string(),
        }
    }
}

/// Error type for discovery and reading retrieval.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    // ── Session ─────────────────────────────────────────────────────
    /// The access token was rejected (expired or revoked).
    #[error("Session rejected by the Smart Water cloud -- re-authentication required")]
    Unauthorized,

    // ── Resources ───────────────────────────────────────────────────
    /// The requested gateway, device, or profile does not exist.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Throttled by the cloud API.
    #[error("Rate limited{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    // ── Transport ───────────────────────────────────────────────────
    /// Network error, timeout, or a 5xx response.
    #[error("Transient API failure: {message}")]
    Transient { message: String },

    /// Unexpected non-success status that fits no other category.
    #[error("Smart Water API error (HTTP {status}): {message}")]
    Http { status: u16, message: String },

    /// URL construction failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with a preview of the body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl ApiError {
    /// Returns `true` if re-authenticating might resolve this error.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if a later attempt is likely to succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::RateLimited { .. })
    }

    /// Server-advertised back-off, if the error carried one.
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            Self::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(std::time::Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

#[allow(clippy::ref_option)]
fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    retry_after_secs
        .map(|secs| format!(" -- retry after {secs}s"))
        .unwrap_or_default()
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Deserialization {
                message: err.to_string(),
                body: String::new(),
            };
        }
        Self::Transient {
            message: err.to_string(),
        }
    }
}
