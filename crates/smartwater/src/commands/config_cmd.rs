//! Config subcommand handlers.

use smartwater_config::{self as swcfg, ConfigError, Profile};
use smartwater_core::diagnostics::REDACTED;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

/// Map an interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_password(profile_name: &str) -> Result<String, CliError> {
    let pw = rpassword::prompt_password(format!("Password for profile '{profile_name}': "))
        .map_err(prompt_err)?;
    if pw.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(pw)
}

/// Copy of a profile that is safe to print.
fn redacted(profile: &Profile) -> Profile {
    let mut shown = profile.clone();
    if shown.password.is_some() {
        shown.password = Some(REDACTED.into());
    }
    shown
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_file(global).display().to_string(), false);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let (name, profile) = cfg.profile(global.profile.as_deref()).map_err(|e| match e {
                ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                    name: profile,
                    available: config::available_profiles(&cfg),
                },
                other => other.into(),
            })?;
            let shown = redacted(profile);

            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => {
                    let body = toml::to_string_pretty(&shown).map_err(ConfigError::from)?;
                    format!("# profile: {name}\n{body}")
                }
                _ => output::render_single(
                    &global.output,
                    &shown,
                    |_| String::new(),
                    |_| String::new(),
                ),
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init {
            url,
            user,
            store_password,
        } => {
            swcfg::parse_api_url(&url)?;
            let path = config::config_file(global);
            let mut cfg = swcfg::load_config_from(&path)?;
            let profile_name = config::active_profile_name(global, &cfg);

            let profile = cfg.profiles.entry(profile_name.clone()).or_default();
            profile.api_url = url;
            profile.username = Some(user);

            if store_password {
                let pw = prompt_password(&profile_name)?;
                swcfg::store_password(&profile_name, &pw)?;
                eprintln!("Password stored in system keyring");
            }

            let default_missing = cfg
                .default_profile
                .as_ref()
                .is_none_or(|d| !cfg.profiles.contains_key(d));
            if default_missing {
                cfg.default_profile = Some(profile_name.clone());
            }
            swcfg::save_config_to(&cfg, &path)?;

            eprintln!("Configuration written to {}", path.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("  Test it: smartwater check");
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = config::load(global)?;
            let profile_name = config::active_profile_name(global, &cfg);
            let pw = prompt_password(&profile_name)?;
            swcfg::store_password(&profile_name, &pw)?;
            eprintln!("Password for profile '{profile_name}' stored in system keyring");
            Ok(())
        }
    }
}
