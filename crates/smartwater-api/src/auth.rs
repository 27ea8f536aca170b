// Session authentication
//
// Username/password login against the Smart Water cloud. A login yields a
// bearer token with a known lifetime; the token is held in a `Session`
// and re-acquired once it is inside the refresh margin.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::client::{body_preview, endpoint};
use crate::error::AuthError;
use crate::models::LoginResponse;

/// Upper bound on a token lifetime we are willing to trust.
const MAX_TOKEN_LIFETIME_SECS: u64 = 30 * 24 * 3600;

/// Login credentials for one Smart Water account.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both username and password are present.
    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.expose_secret().is_empty()
    }
}

/// An authenticated session: bearer token plus expiry.
///
/// `Debug` output never contains the token.
#[derive(Debug, Clone)]
pub struct Session {
    token: SecretString,
    user_id: String,
    expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: SecretString, user_id: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token,
            user_id: user_id.into(),
            expires_at,
        }
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    /// Account id the token was issued for. Doubles as the profile id.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// The token remains usable for at least `margin` past `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        let margin = TimeDelta::from_std(margin).unwrap_or(TimeDelta::MAX);
        now.checked_add_signed(margin)
            .is_some_and(|deadline| deadline < self.expires_at)
    }
}

/// Performs login exchanges and keeps sessions fresh.
pub struct AuthClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    refresh_margin: Duration,
}

impl AuthClient {
    /// Default safety margin before token expiry.
    pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

    /// Create an auth client sharing an existing connection pool.
    pub fn with_client(http: reqwest::Client, base_url: Url, credentials: Credentials) -> Self {
        Self {
            http,
            base_url,
            credentials,
            refresh_margin: Self::DEFAULT_REFRESH_MARGIN,
        }
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Log in with the configured credentials.
    ///
    /// `POST /auth/login`. Empty credentials are rejected without a
    /// network call.
    pub async fn authenticate(&self) -> Result<Session, AuthError> {
        if !self.credentials.is_complete() {
            return Err(AuthError::Unauthorized {
                message: "username and password are required".into(),
            });
        }

        let url = endpoint(&self.base_url, "auth/login").map_err(|e| AuthError::Transient {
            message: format!("invalid login URL: {e}"),
        })?;

        debug!(username = %self.credentials.username, "logging in at {}", url);

        let body = json!({
            "email": self.credentials.username,
            "password": self.credentials.password.expose_secret(),
            "returnSecureToken": true,
        });

        let resp = self.http.post(url).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = format!("login failed (HTTP {status}): {}", body_preview(&body));
            return Err(match status.as_u16() {
                400 | 401 | 403 => AuthError::Unauthorized { message },
                _ => AuthError::Transient { message },
            });
        }

        let login: LoginResponse = resp.json().await.map_err(|e| AuthError::Transient {
            message: format!("unreadable login response: {e}"),
        })?;

        let lifetime = i64::try_from(login.expires_in.min(MAX_TOKEN_LIFETIME_SECS)).unwrap_or(0);
        let session = Session {
            token: SecretString::from(login.id_token),
            user_id: login.local_id,
            expires_at: Utc::now() + TimeDelta::seconds(lifetime),
        };

        debug!(
            user_id = %session.user_id,
            expires_at = %session.expires_at,
            "login successful"
        );
        Ok(session)
    }

    /// Return `session` unchanged while it is outside the refresh margin,
    /// otherwise log in again.
    pub async fn ensure_valid(&self, session: Session) -> Result<Session, AuthError> {
        if session.is_valid_at(Utc::now(), self.refresh_margin) {
            return Ok(session);
        }
        debug!(
            expires_at = %session.expires_at,
            "session token expiring, re-authenticating"
        );
        self.authenticate().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_expiring_in(secs: i64) -> Session {
        Session::new(
            SecretString::from("tok".to_owned()),
            "user-1",
            Utc::now() + TimeDelta::seconds(secs),
        )
    }

    #[test]
    fn session_validity_respects_margin() {
        let now = Utc::now();
        let session = session_expiring_in(120);
        assert!(session.is_valid_at(now, Duration::from_secs(60)));
        assert!(!session.is_valid_at(now, Duration::from_secs(180)));
    }

    #[test]
    fn expired_session_is_invalid() {
        let session = session_expiring_in(-5);
        assert!(!session.is_valid_at(Utc::now(), Duration::ZERO));
    }

    #[test]
    fn session_debug_hides_token() {
        let session = Session::new(
            SecretString::from("super-secret-token".to_owned()),
            "user-1",
            Utc::now(),
        );
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("super-secret-token"));
        assert!(rendered.contains("user-1"));
    }

    #[test]
    fn credentials_completeness() {
        assert!(Credentials::new("a@b.c", "pw".to_owned()).is_complete());
        assert!(!Credentials::new("  ", "pw".to_owned()).is_complete());
        assert!(!Credentials::new("a@b.c", String::new()).is_complete());
    }
}
