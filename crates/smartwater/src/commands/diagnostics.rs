//! `diagnostics`: run one cycle and print the redacted diagnostics report.

use smartwater_core::Coordinator;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub async fn handle(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    // A failed cycle is part of what the report describes
    if let Err(err) = super::refresh_once(coordinator, global).await {
        output::warn(&err.to_string(), global.quiet);
    }

    let report = coordinator.diagnostics().await;
    let format = match global.output {
        OutputFormat::Table | OutputFormat::Plain => &OutputFormat::Json,
        ref other => other,
    };
    let out = output::render_single(format, &report, |_| String::new(), |_| String::new());
    output::print_output(&out, global.quiet);
    Ok(())
}
