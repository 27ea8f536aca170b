//! `watch`: poll on the configured schedule and print a line per publish.

use std::sync::Arc;

use smartwater_core::{Coordinator, Published};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

fn summary(published: &Published, color: bool) -> String {
    let snapshot = &published.snapshot;
    let mut line = format!(
        "{} revision {} | {} device(s), {} reading(s) | {}",
        snapshot
            .published_at
            .map_or_else(|| "-".into(), |t| t.format("%H:%M:%S").to_string()),
        snapshot.revision,
        snapshot.devices.len(),
        snapshot.reading_count(),
        output::availability(published.status.availability, color),
    );
    if !published.changes.is_empty() {
        line.push_str(&format!(
            " | +{} -{}",
            published.changes.added.len(),
            published.changes.removed.len()
        ));
    }
    if let Some(ref err) = published.status.last_error {
        line.push_str(&format!(" | last error: {err}"));
    }
    line
}

fn render(published: &Arc<Published>, global: &GlobalOpts) -> String {
    match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
            output::render_single(
                &global.output,
                published.snapshot.as_ref(),
                |_| String::new(),
                |_| String::new(),
            )
        }
        _ => summary(published, output::should_color(&global.color)),
    }
}

pub async fn handle(
    coordinator: &Coordinator,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    tracing::info!(
        interval_secs = coordinator.config().poll_interval.as_secs(),
        override_secs = ?args.interval,
        "watching"
    );

    let mut stream = coordinator.subscribe();
    coordinator.start().await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = stream.changed() => {
                let Some(published) = next else { break };
                output::print_output(&render(&published, global), global.quiet);
            }
        }
    }

    coordinator.shutdown().await;
    Ok(())
}
