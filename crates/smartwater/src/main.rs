mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use smartwater_core::{Coordinator, CoordinatorConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need an account
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        cmd => {
            let mut resolved = config::resolve(&cli.global)?;
            if let Command::Watch(ref args) = cmd {
                apply_interval(&mut resolved.config, args.interval)?;
            }
            let profile_name = resolved.profile_name;
            let coordinator = Coordinator::new(resolved.config)
                .map_err(|e| CliError::from(e).for_profile(&profile_name))?;

            tracing::debug!(command = ?cmd, profile = %profile_name, "dispatching command");
            commands::dispatch(cmd, &coordinator, &cli.global)
                .await
                .map_err(|e| e.for_profile(&profile_name))
        }
    }
}

/// `watch --interval` overrides the profile's poll interval.
fn apply_interval(config: &mut CoordinatorConfig, interval: Option<u64>) -> Result<(), CliError> {
    match interval {
        Some(0) => Err(CliError::Validation {
            field: "interval".into(),
            reason: "must be greater than zero".into(),
        }),
        Some(secs) => {
            config.poll_interval = Duration::from_secs(secs);
            Ok(())
        }
        None => Ok(()),
    }
}
