//! `snapshot`: run one refresh cycle and print devices and readings.

use serde::Serialize;
use tabled::Tabled;

use smartwater_core::{
    Coordinator, CoordinatorStatus, DeviceEntry, DeviceId, SensorReading, Snapshot,
};

use crate::cli::{GlobalOpts, OutputFormat, SnapshotArgs};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ReadingRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Reading")]
    reading: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Stale")]
    stale: String,
}

/// One reading together with the device it belongs to.
#[derive(Serialize)]
struct ReadingLine<'a> {
    #[serde(skip)]
    entry: &'a DeviceEntry,
    #[serde(flatten)]
    reading: &'a SensorReading,
}

impl From<&ReadingLine<'_>> for ReadingRow {
    fn from(line: &ReadingLine<'_>) -> Self {
        Self {
            device: line.entry.device.id.to_string(),
            name: line.entry.device.name.clone(),
            kind: line.entry.device.kind.to_string(),
            reading: line.reading.name.clone(),
            value: line.reading.value.to_string(),
            unit: line.reading.unit.map(|u| u.to_string()).unwrap_or_default(),
            stale: if line.entry.stale { "yes" } else { "" }.into(),
        }
    }
}

/// Structured output: the snapshot with the status it was published under.
#[derive(Serialize)]
struct SnapshotView<'a> {
    status: &'a CoordinatorStatus,
    snapshot: &'a Snapshot,
}

fn lines<'a>(entries: &[&'a DeviceEntry], all: bool) -> Vec<ReadingLine<'a>> {
    entries
        .iter()
        .copied()
        .flat_map(|entry| {
            entry
                .readings
                .values()
                .filter(move |r| all || r.enabled_by_default)
                .map(move |reading| ReadingLine { entry, reading })
        })
        .collect()
}

pub async fn handle(
    coordinator: &Coordinator,
    args: &SnapshotArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    super::refresh_once(coordinator, global).await?;
    let published = coordinator.current();
    let snapshot = &published.snapshot;

    let entries: Vec<&DeviceEntry> = match args.device {
        Some(ref id) => {
            let entry = snapshot
                .device(&DeviceId::from(id.as_str()))
                .ok_or_else(|| CliError::DeviceNotFound {
                    identifier: id.clone(),
                })?;
            vec![entry]
        }
        None => snapshot.devices.values().collect(),
    };

    let out = match (&global.output, args.device.as_ref()) {
        // Whole snapshot for structured formats
        (OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml, None) => {
            let view = SnapshotView {
                status: &published.status,
                snapshot,
            };
            output::render_single(&global.output, &view, |_| String::new(), |_| String::new())
        }
        (OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml, Some(_)) => {
            output::render_single(
                &global.output,
                &entries,
                |_| String::new(),
                |_| String::new(),
            )
        }
        _ => {
            let lines = lines(&entries, args.all);
            let table = output::render_list(
                &global.output,
                &lines,
                |l| ReadingRow::from(l),
                |l| format!("{}/{}={}", l.reading.device_id, l.reading.key, l.reading.value),
            );
            if matches!(global.output, OutputFormat::Table) {
                let color = output::should_color(&global.color);
                format!(
                    "{table}\nrevision {} | {} device(s) | {}",
                    snapshot.revision,
                    snapshot.devices.len(),
                    output::availability(published.status.availability, color)
                )
            } else {
                table
            }
        }
    };

    output::print_output(&out, global.quiet);
    Ok(())
}
