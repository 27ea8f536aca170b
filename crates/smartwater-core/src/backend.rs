// ── Backend seam ──
//
// The coordinator talks to the cloud only through these two traits.
// The HTTP clients from smartwater-api implement them; tests substitute
// scripted doubles.

use async_trait::async_trait;
use smartwater_api::{
    ApiError, AuthClient, AuthError, DeviceRef, Discovery, RawProfile, ReadingResults,
    Session, SmartWaterClient,
};

/// Owns the credentials and hands out sessions.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Perform a fresh login.
    async fn authenticate(&self) -> Result<Session, AuthError>;

    /// Return a session that stays valid past the refresh margin,
    /// re-authenticating only when needed.
    async fn ensure_valid(&self, session: Session) -> Result<Session, AuthError>;
}

/// Discovery and reading retrieval for an authenticated account.
#[async_trait]
pub trait DeviceSource: Send + Sync {
    async fn fetch_profile(&self, session: &Session) -> Result<RawProfile, ApiError>;

    async fn discover(&self, session: &Session) -> Result<Discovery, ApiError>;

    /// Every id in `devices` must appear in the result.
    async fn fetch_readings(&self, session: &Session, devices: &[DeviceRef]) -> ReadingResults;
}

#[async_trait]
impl Authenticator for AuthClient {
    async fn authenticate(&self) -> Result<Session, AuthError> {
        AuthClient::authenticate(self).await
    }

    async fn ensure_valid(&self, session: Session) -> Result<Session, AuthError> {
        AuthClient::ensure_valid(self, session).await
    }
}

#[async_trait]
impl DeviceSource for SmartWaterClient {
    async fn fetch_profile(&self, session: &Session) -> Result<RawProfile, ApiError> {
        SmartWaterClient::fetch_profile(self, session).await
    }

    async fn discover(&self, session: &Session) -> Result<Discovery, ApiError> {
        SmartWaterClient::discover(self, session).await
    }

    async fn fetch_readings(&self, session: &Session, devices: &[DeviceRef]) -> ReadingResults {
        SmartWaterClient::fetch_readings(self, session, devices).await
    }
}
