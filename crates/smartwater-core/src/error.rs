// ── Core error types ──
//
// User-facing errors from smartwater-core. Consumers never see HTTP
// status codes or JSON parse failures directly: the `From` impls below
// translate transport-layer errors into domain variants.

use smartwater_api::{ApiError, AuthError};
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    /// The cloud rejected the credentials. User-correctable, never retried.
    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    #[error("Session rejected by the Smart Water cloud")]
    SessionRejected,

    // ── Connection ───────────────────────────────────────────────────
    #[error("Cannot reach the Smart Water cloud: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Rate limited by the Smart Water cloud")]
    RateLimited { retry_after_secs: Option<u64> },

    // ── Data ─────────────────────────────────────────────────────────
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("API error: {message}")]
    Api { message: String, status: Option<u16> },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Coordinator has been shut down")]
    ShutDown,
}

impl CoreError {
    /// The user has to change something (credentials, config) to recover.
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, Self::InvalidCredentials { .. } | Self::Config { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<AuthError> for CoreError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized { message } => Self::InvalidCredentials { message },
            AuthError::Transient { message } => Self::ConnectionFailed { reason: message },
        }
    }
}

impl From<ApiError> for CoreError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => Self::SessionRejected,
            ApiError::NotFound { resource } => Self::NotFound { resource },
            ApiError::RateLimited { retry_after_secs } => Self::RateLimited { retry_after_secs },
            ApiError::Transient { message } => Self::ConnectionFailed { reason: message },
            ApiError::Http { status, message } => Self::Api {
                message,
                status: Some(status),
            },
            ApiError::InvalidUrl(e) => Self::Config {
                message: format!("invalid API URL: {e}"),
            },
            ApiError::Deserialization { message, .. } => Self::Api {
                message,
                status: None,
            },
        }
    }
}

// ── Mapping errors ───────────────────────────────────────────────────

/// A reading payload could not be normalized. Isolated to one device.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    #[error("device {device}: expected a JSON object payload, got {found}")]
    UnexpectedShape { device: String, found: &'static str },

    #[error("device {device}: field `{key}` has malformed value {value} (expected {expected})")]
    InvalidValue {
        device: String,
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

// ── Cycle errors ─────────────────────────────────────────────────────

/// Why a single device failed within an otherwise running cycle.
#[derive(Debug, Clone, Error)]
pub enum DeviceFailure {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

/// Why a whole refresh cycle failed.
#[derive(Debug, Clone, Error)]
pub enum CycleError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("session rejected after re-authentication")]
    SessionRejected,

    #[error("device discovery failed: {0}")]
    Discovery(ApiError),

    #[error("all {count} devices failed to refresh (first error: {first})")]
    AllDevicesFailed { count: usize, first: DeviceFailure },

    #[error("coordinator is shut down")]
    ShutDown,
}
