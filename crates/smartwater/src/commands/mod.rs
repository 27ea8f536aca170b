//! Command dispatch: bridges CLI args -> coordinator calls -> output formatting.

pub mod check;
pub mod config_cmd;
pub mod diagnostics;
pub mod snapshot;
pub mod watch;

use smartwater_core::{Coordinator, CycleOutcome};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Dispatch an account-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    coordinator: &Coordinator,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Check => check::handle(coordinator, global).await,
        Command::Snapshot(args) => snapshot::handle(coordinator, &args, global).await,
        Command::Watch(args) => watch::handle(coordinator, &args, global).await,
        Command::Diagnostics => diagnostics::handle(coordinator, global).await,
        // Config is handled before dispatch
        Command::Config(_) => unreachable!(),
    }
}

/// Run one refresh cycle, failing the command when nothing was published.
pub(crate) async fn refresh_once(
    coordinator: &Coordinator,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match coordinator.refresh().await {
        CycleOutcome::Success | CycleOutcome::Coalesced => Ok(()),
        CycleOutcome::PartialFailure { failed } => {
            let ids: Vec<String> = failed.iter().map(ToString::to_string).collect();
            output::warn(
                &format!(
                    "{} device(s) failed to refresh and show earlier readings: {}",
                    ids.len(),
                    ids.join(", ")
                ),
                global.quiet,
            );
            Ok(())
        }
        CycleOutcome::Deferred { remaining } => {
            output::warn(
                &format!(
                    "rate limited by the cloud, showing earlier readings (retry in {}s)",
                    remaining.as_secs()
                ),
                global.quiet,
            );
            Ok(())
        }
        CycleOutcome::Failure { error } => Err(error.into()),
    }
}
