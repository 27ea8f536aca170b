//! Shared configuration for Smart Water tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `smartwater_core::CoordinatorConfig`. The CLI adds
//! flag-aware overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use smartwater_core::{CoordinatorConfig, Credentials};

/// Keyring service name; entries are keyed `{profile}/password`.
pub const KEYRING_SERVICE: &str = "smartwater";

/// Prefix for environment overrides, e.g. `SMARTWATER_DEFAULTS__POLL_INTERVAL=60`.
pub const ENV_PREFIX: &str = "SMARTWATER_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{profile}' not found in config")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());
        self.profiles
            .get(&name)
            .map(|p| (name.clone(), p))
            .ok_or(ConfigError::UnknownProfile { profile: name })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds between scheduled refresh cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    #[serde(default = "default_removal_debounce")]
    pub removal_debounce: u32,

    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
            removal_debounce: default_removal_debounce(),
            failure_threshold: default_failure_threshold(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    CoordinatorConfig::DEFAULT_POLL_INTERVAL.as_secs()
}
fn default_removal_debounce() -> u32 {
    CoordinatorConfig::DEFAULT_REMOVAL_DEBOUNCE
}
fn default_failure_threshold() -> u32 {
    CoordinatorConfig::DEFAULT_FAILURE_THRESHOLD
}
fn default_max_concurrent_requests() -> usize {
    CoordinatorConfig::DEFAULT_MAX_CONCURRENT_REQUESTS
}

/// A named Smart Water account.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Cloud API base URL.
    pub api_url: String,

    /// Account login (email address).
    pub username: Option<String>,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    // Per-profile overrides of [`Defaults`].
    pub timeout: Option<u64>,
    pub poll_interval: Option<u64>,
    pub removal_debounce: Option<u32>,
    pub failure_threshold: Option<u32>,
    pub max_concurrent_requests: Option<usize>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "smartwater").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("smartwater");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from an explicit file. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the password: profile's env var → system keyring → plaintext.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_password_with(
        profile,
        profile_name,
        |name| std::env::var(name).ok(),
        |account| {
            keyring::Entry::new(KEYRING_SERVICE, account)
                .ok()?
                .get_password()
                .ok()
        },
    )
}

fn resolve_password_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    // 1. Env var named by the profile
    if let Some(value) = profile.password_env.as_deref().and_then(&env) {
        return Ok(SecretString::from(value));
    }

    // 2. System keyring
    if let Some(value) = keyring(&format!("{profile_name}/password")) {
        return Ok(SecretString::from(value));
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a password in the system keyring for `profile_name`.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
        .and_then(|entry| entry.set_password(password))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

/// Username and password for a profile.
pub fn resolve_credentials(profile: &Profile, profile_name: &str) -> Result<Credentials, ConfigError> {
    let username = profile
        .username
        .clone()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;
    let password = resolve_password(profile, profile_name)?;
    Ok(Credentials::new(username, password))
}

// ── Translation ─────────────────────────────────────────────────────

/// Parse and check an API base URL.
pub fn parse_api_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "api_url".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

/// Build a `CoordinatorConfig` from a profile and the global defaults.
pub fn profile_to_coordinator_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<CoordinatorConfig, ConfigError> {
    let url = parse_api_url(&profile.api_url)?;
    let credentials = resolve_credentials(profile, profile_name)?;
    build_coordinator_config(url, credentials, profile, defaults)
}

/// Apply a profile's policy settings to explicit url + credentials.
pub fn build_coordinator_config(
    url: url::Url,
    credentials: Credentials,
    profile: &Profile,
    defaults: &Defaults,
) -> Result<CoordinatorConfig, ConfigError> {
    let mut config = CoordinatorConfig::new(url, credentials);
    config.timeout = Duration::from_secs(positive(
        "timeout",
        profile.timeout.unwrap_or(defaults.timeout),
    )?);
    config.poll_interval = Duration::from_secs(positive(
        "poll_interval",
        profile.poll_interval.unwrap_or(defaults.poll_interval),
    )?);
    config.removal_debounce = positive(
        "removal_debounce",
        profile.removal_debounce.unwrap_or(defaults.removal_debounce),
    )?;
    config.failure_threshold = positive(
        "failure_threshold",
        profile.failure_threshold.unwrap_or(defaults.failure_threshold),
    )?;
    config.max_concurrent_requests = positive(
        "max_concurrent_requests",
        profile
            .max_concurrent_requests
            .unwrap_or(defaults.max_concurrent_requests),
    )?;
    Ok(config)
}

fn positive<T: PartialEq + Default>(field: &str, value: T) -> Result<T, ConfigError> {
    if value == T::default() {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn profile() -> Profile {
        Profile {
            api_url: "https://cloud.example.com/v1/".into(),
            username: Some("jane@example.com".into()),
            password: Some("from-file".into()),
            ..Profile::default()
        }
    }

    #[test]
    fn loads_profiles_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_profile = "home"

[defaults]
poll_interval = 300

[profiles.home]
api_url = "https://cloud.example.com/"
username = "jane@example.com"
password_env = "HOME_TANK_PW"
failure_threshold = 5
"#
        )
        .unwrap();

        let config = load_config_from(file.path()).unwrap();
        let (name, home) = config.profile(None).unwrap();

        assert_eq!(name, "home");
        assert_eq!(home.password_env.as_deref(), Some("HOME_TANK_PW"));
        assert_eq!(config.defaults.poll_interval, 300);
        assert_eq!(config.defaults.removal_debounce, 3);
        assert_eq!(config.defaults.output, "table");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert!(config.profiles.is_empty());
        assert_eq!(config.defaults.poll_interval, 120);
        assert!(matches!(
            config.profile(Some("nope")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.profiles.insert("default".into(), profile());

        save_config_to(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();

        let (_, p) = loaded.profile(None).unwrap();
        assert_eq!(p.api_url, "https://cloud.example.com/v1/");
    }

    #[test]
    fn password_chain_order() {
        let mut p = profile();
        p.password_env = Some("TANK_PW".into());

        let env = |name: &str| (name == "TANK_PW").then(|| "from-env".to_owned());
        let keyring = |account: &str| (account == "home/password").then(|| "from-keyring".to_owned());
        let none = |_: &str| None;

        let pw = resolve_password_with(&p, "home", env, keyring).unwrap();
        assert_eq!(pw.expose_secret(), "from-env");

        let pw = resolve_password_with(&p, "home", none, keyring).unwrap();
        assert_eq!(pw.expose_secret(), "from-keyring");

        let pw = resolve_password_with(&p, "home", none, none).unwrap();
        assert_eq!(pw.expose_secret(), "from-file");

        p.password = None;
        assert!(matches!(
            resolve_password_with(&p, "home", none, none),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn profile_overrides_defaults() {
        let mut p = profile();
        p.poll_interval = Some(45);
        p.removal_debounce = Some(5);

        let config = build_coordinator_config(
            parse_api_url(&p.api_url).unwrap(),
            Credentials::new("jane@example.com", "pw".to_owned()),
            &p,
            &Defaults::default(),
        )
        .unwrap();

        assert_eq!(config.poll_interval, Duration::from_secs(45));
        assert_eq!(config.removal_debounce, 5);
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            parse_api_url("not a url"),
            Err(ConfigError::Validation { .. })
        ));
        assert!(matches!(
            parse_api_url("ftp://cloud.example.com"),
            Err(ConfigError::Validation { .. })
        ));

        let mut p = profile();
        p.poll_interval = Some(0);
        let err = build_coordinator_config(
            parse_api_url(&p.api_url).unwrap(),
            Credentials::new("jane@example.com", "pw".to_owned()),
            &p,
            &Defaults::default(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "invalid poll_interval: must be greater than zero");
    }

    #[test]
    fn missing_username_is_no_credentials() {
        let mut p = profile();
        p.username = None;
        assert!(matches!(
            resolve_credentials(&p, "default"),
            Err(ConfigError::NoCredentials { .. })
        ));
    }
}
