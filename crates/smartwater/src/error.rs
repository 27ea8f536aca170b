//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use smartwater_config::ConfigError;
use smartwater_core::{CoreError, CycleError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the Smart Water cloud")]
    #[diagnostic(
        code(smartwater::connection_failed),
        help(
            "Check network access and the configured API URL.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Rate limited by the Smart Water cloud")]
    #[diagnostic(
        code(smartwater::rate_limited),
        help("Wait a few minutes before retrying, or raise poll_interval in your profile.")
    )]
    RateLimited,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(smartwater::auth_failed),
        help(
            "Verify the username and password for profile '{profile}'.\n\
             Run: smartwater config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(smartwater::no_credentials),
        help(
            "Configure credentials with: smartwater config init --url <URL> --user <USER> --store-password\n\
             Or set SMARTWATER_USERNAME and SMARTWATER_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Data ─────────────────────────────────────────────────────────
    #[error("Device '{identifier}' not found")]
    #[diagnostic(
        code(smartwater::not_found),
        help("Run: smartwater snapshot to see available devices")
    )]
    DeviceNotFound { identifier: String },

    #[error("Refresh failed: {reason}")]
    #[diagnostic(code(smartwater::refresh_failed))]
    RefreshFailed { reason: String },

    #[error("API error: {message}")]
    #[diagnostic(code(smartwater::api_error))]
    Api { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(smartwater::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(smartwater::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: smartwater config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No configuration found")]
    #[diagnostic(
        code(smartwater::no_config),
        help(
            "Create one with: smartwater config init --url <URL> --user <USER>\n\
             Or pass --api-url and --username.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(smartwater::config))]
    Config(ConfigError),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Attach the active profile name to credential errors.
    pub fn for_profile(self, name: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                profile: name.into(),
                message,
            },
            Self::NoCredentials { .. } => Self::NoCredentials {
                profile: name.into(),
            },
            other => other,
        }
    }

    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::RateLimited => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::DeviceNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::ProfileNotFound { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::UnknownProfile { profile } => Self::ProfileNotFound {
                name: profile,
                available: "(none)".into(),
            },
            other => Self::Config(other),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidCredentials { message } => Self::AuthFailed {
                profile: "current".into(),
                message,
            },
            CoreError::SessionRejected => Self::AuthFailed {
                profile: "current".into(),
                message: "session rejected".into(),
            },
            CoreError::ConnectionFailed { reason } => Self::ConnectionFailed { reason },
            CoreError::RateLimited { .. } => Self::RateLimited,
            CoreError::NotFound { resource } => Self::Api {
                message: format!("not found: {resource}"),
            },
            CoreError::Api { message, .. } => Self::Api { message },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::ShutDown => Self::RefreshFailed {
                reason: "coordinator shut down".into(),
            },
        }
    }
}

impl From<CycleError> for CliError {
    fn from(err: CycleError) -> Self {
        match err {
            CycleError::Auth(auth) => CoreError::from(auth).into(),
            CycleError::SessionRejected => Self::AuthFailed {
                profile: "current".into(),
                message: "session rejected after re-authentication".into(),
            },
            CycleError::Discovery(api) => CoreError::from(api).into(),
            other => Self::RefreshFailed {
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use smartwater_core::AuthError;

    use super::*;

    #[test]
    fn auth_cycle_failure_exits_with_auth_code() {
        let err = CliError::from(CycleError::Auth(AuthError::Unauthorized {
            message: "INVALID_PASSWORD".into(),
        }));
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
