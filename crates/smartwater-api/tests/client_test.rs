#![allow(clippy::unwrap_used)]
// Integration tests for `AuthClient` and `SmartWaterClient` using wiremock.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use pretty_assertions::assert_eq;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use smartwater_api::{
    ApiError, AuthClient, AuthError, Credentials, DeviceFamily, DeviceRef, Session,
    SmartWaterClient,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup_auth(username: &str, password: &str) -> (MockServer, AuthClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = AuthClient::with_client(
        reqwest::Client::new(),
        base_url,
        Credentials::new(username, password.to_owned()),
    );
    (server, client)
}

async fn setup_client() -> (MockServer, SmartWaterClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = SmartWaterClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

fn session() -> Session {
    Session::new(
        SecretString::from("tok-123".to_owned()),
        "user-1",
        Utc::now() + TimeDelta::hours(1),
    )
}

fn login_body(expires_in: &str) -> serde_json::Value {
    json!({
        "idToken": "tok-123",
        "refreshToken": "refresh-456",
        "expiresIn": expires_in,
        "localId": "user-1"
    })
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_authenticate_success() {
    let (server, client) = setup_auth("jane@example.com", "hunter2").await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_partial_json(json!({
            "email": "jane@example.com",
            "password": "hunter2"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("3600")))
        .expect(1)
        .mount(&server)
        .await;

    let session = client.authenticate().await.unwrap();

    assert_eq!(session.user_id(), "user-1");
    assert_eq!(session.token().expose_secret(), "tok-123");
    assert!(session.expires_at() > Utc::now() + TimeDelta::minutes(59));
}

#[tokio::test]
async fn test_ensure_valid_within_window_makes_no_request() {
    let (server, client) = setup_auth("jane@example.com", "hunter2").await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("3600")))
        .expect(1)
        .mount(&server)
        .await;

    let session = client.authenticate().await.unwrap();
    let expires_at = session.expires_at();
    let session = client.ensure_valid(session).await.unwrap();
    let session = client.ensure_valid(session).await.unwrap();

    assert_eq!(session.expires_at(), expires_at);
    server.verify().await;
}

#[tokio::test]
async fn test_ensure_valid_reauthenticates_inside_margin() {
    let (server, client) = setup_auth("jane@example.com", "hunter2").await;
    let client = client.with_refresh_margin(Duration::from_secs(60));

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("30")))
        .expect(2)
        .mount(&server)
        .await;

    let session = client.authenticate().await.unwrap();
    client.ensure_valid(session).await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn test_authenticate_rejected() {
    let (server, client) = setup_auth("jane@example.com", "wrong").await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "error": { "message": "INVALID_PASSWORD" } })),
        )
        .mount(&server)
        .await;

    let result = client.authenticate().await;

    assert!(
        matches!(result, Err(AuthError::Unauthorized { .. })),
        "expected Unauthorized, got: {result:?}"
    );
}

#[tokio::test]
async fn test_authenticate_server_error_is_transient() {
    let (server, client) = setup_auth("jane@example.com", "hunter2").await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = client.authenticate().await;

    assert!(
        matches!(result, Err(AuthError::Transient { .. })),
        "expected Transient, got: {result:?}"
    );
}

#[tokio::test]
async fn test_authenticate_empty_credentials_skips_network() {
    let (server, client) = setup_auth("", "").await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body("3600")))
        .expect(0)
        .mount(&server)
        .await;

    let result = client.authenticate().await;

    assert!(matches!(result, Err(AuthError::Unauthorized { .. })));
    server.verify().await;
}

// ── Discovery tests ─────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_profile() {
    let (server, client) = setup_client().await;

    Mock::given(method("GET"))
        .and(path("/profiles/user-1"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user-1",
            "name": "Jane Doe",
            "email": "jane@example.com"
        })))
        .mount(&server)
        .await;

    let profile = client.fetch_profile(&session()).await.unwrap();

    assert_eq!(profile.id, "user-1");
    assert_eq!(profile.name.as_deref(), Some("Jane Doe"));
}

#[tokio::test]
async fn test_discover_empty_account() {
    let (server, client) = setup_client().await;

    Mock::given(method("GET"))
        .and(path("/profiles/user-1/gateways"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let discovery = client.discover(&session()).await.unwrap();
    assert!(discovery.devices.is_empty());
    assert!(discovery.unlisted_gateways.is_empty());
}

#[tokio::test]
async fn test_discover_gateways_and_devices() {
    let (server, client) = setup_client().await;

    Mock::given(method("GET"))
        .and(path("/profiles/user-1/gateways"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "gw1": { "name": "Shed hub", "status": "online" }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gateways/gw1/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "t1": { "name": "Rain tank", "type": "tank", "gatewayId": "gw1" },
            "p1": { "name": "Bore pump", "type": "pump", "gatewayId": "gw1" }
        })))
        .mount(&server)
        .await;

    let discovery = client.discover(&session()).await.unwrap();
    assert!(discovery.unlisted_gateways.is_empty());
    let devices = discovery.devices;
    let mut ids: Vec<(&str, DeviceFamily, Option<&str>)> = devices
        .iter()
        .map(|d| (d.id.as_str(), d.family, d.gateway_id.as_deref()))
        .collect();
    ids.sort_by_key(|(id, _, _)| *id);

    assert_eq!(
        ids,
        vec![
            ("gw1", DeviceFamily::Gateway, None),
            ("p1", DeviceFamily::Device, Some("gw1")),
            ("t1", DeviceFamily::Device, Some("gw1")),
        ]
    );
    let tank = devices.iter().find(|d| d.id == "t1").unwrap();
    assert_eq!(tank.str_field("type"), Some("tank"));
}

#[tokio::test]
async fn test_discover_reports_unlisted_gateway() {
    let (server, client) = setup_client().await;

    Mock::given(method("GET"))
        .and(path("/profiles/user-1/gateways"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "gw1": {} })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gateways/gw1/devices"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let discovery = client.discover(&session()).await.unwrap();
    assert_eq!(discovery.devices.len(), 1);
    assert_eq!(discovery.devices[0].family, DeviceFamily::Gateway);
    assert_eq!(discovery.unlisted_gateways, vec!["gw1".to_owned()]);
}

#[tokio::test]
async fn test_discover_unauthorized() {
    let (server, client) = setup_client().await;

    Mock::given(method("GET"))
        .and(path("/profiles/user-1/gateways"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.discover(&session()).await;
    assert!(matches!(result, Err(ApiError::Unauthorized)));
}

// ── Reading tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_readings_partial_failure_map() {
    let (server, client) = setup_client().await;

    Mock::given(method("GET"))
        .and(path("/devices/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "waterLevel": 71 })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/devices/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/devices/busy"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/devices/broken"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gateways/gw1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "online" })))
        .mount(&server)
        .await;

    let refs: Vec<DeviceRef> = ["ok", "gone", "busy", "broken"]
        .iter()
        .map(|id| DeviceRef {
            id: (*id).to_owned(),
            family: DeviceFamily::Device,
        })
        .chain(std::iter::once(DeviceRef {
            id: "gw1".into(),
            family: DeviceFamily::Gateway,
        }))
        .collect();

    let results = client.fetch_readings(&session(), &refs).await;

    assert_eq!(results.len(), 5);
    assert_eq!(results["ok"].as_ref().unwrap().data["waterLevel"], 71);
    assert_eq!(results["gw1"].as_ref().unwrap().data["status"], "online");
    assert!(matches!(results["gone"], Err(ApiError::NotFound { .. })));
    assert!(matches!(
        results["busy"],
        Err(ApiError::RateLimited {
            retry_after_secs: Some(30)
        })
    ));
    assert!(matches!(results["broken"], Err(ApiError::Transient { .. })));
}

#[tokio::test]
async fn test_fetch_readings_malformed_body() {
    let (server, client) = setup_client().await;

    Mock::given(method("GET"))
        .and(path("/devices/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let refs = [DeviceRef {
        id: "t1".into(),
        family: DeviceFamily::Device,
    }];
    let results = client.fetch_readings(&session(), &refs).await;

    assert!(matches!(
        results["t1"],
        Err(ApiError::Deserialization { .. })
    ));
}

#[tokio::test]
async fn test_fetch_readings_empty_request() {
    let (_server, client) = setup_client().await;
    let results = client.fetch_readings(&session(), &[]).await;
    assert!(results.is_empty());
}
