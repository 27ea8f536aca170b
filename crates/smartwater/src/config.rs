//! Flag-aware profile resolution on top of `smartwater-config`.
//!
//! Precedence for every setting is flag/env var > profile > `[defaults]`.

use std::io::IsTerminal;
use std::path::PathBuf;

use secrecy::SecretString;

use smartwater_config::{self as swcfg, Config, Profile};
use smartwater_core::{CoordinatorConfig, Credentials};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// A coordinator config plus the profile it came from.
pub struct Resolved {
    pub profile_name: String,
    pub config: CoordinatorConfig,
}

/// Config file in effect: `--config` or the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(swcfg::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(swcfg::load_config_from(&config_file(global))?)
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Sorted, comma-separated profile names for error help text.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}

/// Build a `CoordinatorConfig` from the config file, profile, and CLI overrides.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load(global)?;
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profiles.get(&profile_name) {
        Some(p) => p.clone(),
        // No profile, but flags may carry everything needed
        None if global.api_url.is_some() => Profile::default(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(&cfg),
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_file(global).display().to_string(),
            });
        }
    };

    // 1. URL (flag > env > profile)
    let url = swcfg::parse_api_url(global.api_url.as_deref().unwrap_or(&profile.api_url))?;

    // 2. Credentials
    let username = global
        .username
        .clone()
        .or_else(|| profile.username.clone())
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| CliError::NoCredentials {
            profile: profile_name.clone(),
        })?;
    let password = resolve_password(global, &profile, &profile_name, &username)?;

    // 3. Policy overrides
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }

    let config = swcfg::build_coordinator_config(
        url,
        Credentials::new(username, password),
        &profile,
        &cfg.defaults,
    )?;

    Ok(Resolved {
        profile_name,
        config,
    })
}

/// `--password` / `SMARTWATER_PASSWORD`, then the profile chain, then an
/// interactive prompt when stdin is a terminal.
fn resolve_password(
    global: &GlobalOpts,
    profile: &Profile,
    profile_name: &str,
    username: &str,
) -> Result<SecretString, CliError> {
    if let Some(ref pw) = global.password {
        return Ok(SecretString::from(pw.clone()));
    }

    match swcfg::resolve_password(profile, profile_name) {
        Ok(secret) => Ok(secret),
        Err(err) if std::io::stdin().is_terminal() => {
            tracing::debug!(error = %err, "no stored password, prompting");
            let pw = rpassword::prompt_password(format!("Password for {username}: "))?;
            if pw.is_empty() {
                return Err(CliError::NoCredentials {
                    profile: profile_name.into(),
                });
            }
            Ok(SecretString::from(pw))
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use clap::Parser;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["smartwater"];
        argv.extend_from_slice(args);
        argv.push("check");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn config_with_home_profile() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_profile = "home"

[profiles.home]
api_url = "https://cloud.example.com/"
username = "jane@example.com"
password = "from-file"
poll_interval = 60

[profiles.cabin]
api_url = "https://cloud.example.com/"
"#
        )
        .unwrap();
        file
    }

    #[test]
    fn flags_alone_are_enough() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.toml");
        let g = global(&[
            "--config",
            path.to_str().unwrap(),
            "--api-url",
            "https://cloud.example.com/",
            "--username",
            "jane@example.com",
            "--password",
            "hunter2",
            "--timeout",
            "5",
        ]);

        let resolved = resolve(&g).unwrap();
        assert_eq!(resolved.profile_name, "default");
        assert_eq!(resolved.config.timeout, Duration::from_secs(5));
        assert_eq!(resolved.config.credentials.username, "jane@example.com");
        assert_eq!(resolved.config.credentials.password.expose_secret(), "hunter2");
    }

    #[test]
    fn profile_settings_apply_under_flags() {
        let file = config_with_home_profile();
        let g = global(&[
            "--config",
            file.path().to_str().unwrap(),
            "--password",
            "from-flag",
        ]);

        let resolved = resolve(&g).unwrap();
        assert_eq!(resolved.profile_name, "home");
        assert_eq!(resolved.config.poll_interval, Duration::from_secs(60));
        assert_eq!(resolved.config.credentials.password.expose_secret(), "from-flag");
    }

    #[test]
    fn unknown_profile_lists_available() {
        let file = config_with_home_profile();
        let g = global(&["--config", file.path().to_str().unwrap(), "-p", "office"]);

        match resolve(&g) {
            Err(CliError::ProfileNotFound { name, available }) => {
                assert_eq!(name, "office");
                assert_eq!(available, "cabin, home");
            }
            other => panic!("expected ProfileNotFound, got {:?}", other.err()),
        }
    }

    #[test]
    fn missing_config_without_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.toml");
        let g = global(&["--config", path.to_str().unwrap()]);

        assert!(matches!(resolve(&g), Err(CliError::NoConfig { .. })));
    }

    #[test]
    fn missing_username_is_no_credentials() {
        let file = config_with_home_profile();
        let g = global(&[
            "--config",
            file.path().to_str().unwrap(),
            "-p",
            "cabin",
            "--password",
            "pw",
        ]);

        assert!(matches!(
            resolve(&g),
            Err(CliError::NoCredentials { profile }) if profile == "cabin"
        ));
    }
}
