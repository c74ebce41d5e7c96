//! The JSON export job and the terminal printer.

use crate::pipeline::Pipeline;
use crate::schedule::{ExportedSchedule, SynthesizedSchedule};
use crate::utils::fmt_duration;
use anyhow::{Context, anyhow};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fmt::Write as _;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Serialize with four-space indentation.
pub fn to_json_4space<T: Serialize>(value: &T) -> anyhow::Result<String> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8(buf)?)
}

async fn current_or_fail(
    pipeline: &Pipeline,
    username: &str,
    password: &str,
) -> anyhow::Result<SynthesizedSchedule> {
    pipeline
        .current_schedule(username, password)
        .await
        .context("failed to fetch current schedule")?
        .ok_or_else(|| anyhow!("could not determine current schedule from the calendar"))
}

/// Fetch today's schedule and write it to `output`.
pub async fn export_once(
    pipeline: &Pipeline,
    username: &str,
    password: &str,
    output: &Path,
) -> anyhow::Result<ExportedSchedule> {
    let started = Instant::now();
    let schedule = current_or_fail(pipeline, username, password).await?;
    let exported = ExportedSchedule::on_date(&schedule, pipeline.today(), pipeline.timezone());

    let json = to_json_4space(&exported)?;
    tokio::fs::write(output, json)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(
        day = %exported.day,
        schedule_type = %exported.schedule_type,
        periods = exported.periods.len(),
        path = %output.display(),
        elapsed = fmt_duration(started.elapsed()),
        "schedule exported"
    );
    Ok(exported)
}

/// Export once, or with `every` set, immediately and then on that interval
/// until `cancel` fires. Failures in repeat mode are logged and retried next time.
pub async fn run_export(
    pipeline: &Pipeline,
    (username, password): (&str, &str),
    output: &Path,
    every: Option<Duration>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let Some(interval) = every else {
        export_once(pipeline, username, password, output).await?;
        return Ok(());
    };

    info!(interval = fmt_duration(interval), "export daemon started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = export_once(pipeline, username, password, output) => {
                if let Err(e) = result {
                    error!(error = ?e, "scheduled export failed");
                }
            }
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    info!("export daemon stopped");
    Ok(())
}

/// Human-readable rendering of a schedule.
pub fn render_schedule(schedule: &SynthesizedSchedule) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} Day ({}) ===\n", schedule.day, schedule.schedule_type);
    for period in &schedule.periods {
        let _ = writeln!(
            out,
            "Period {}: {} - {}",
            period.period,
            period.start.format("%-I:%M %p"),
            period.end.format("%-I:%M %p")
        );
        match &period.course {
            Some(course) => {
                let _ = writeln!(out, "  Course: {}", course.name);
                let _ = writeln!(out, "  Section: {}", course.section);
                let _ = writeln!(out, "  Room: {}", course.room);
                let _ = writeln!(out, "  Capacity: {}", course.capacity);
            }
            None => {
                let _ = writeln!(out, "  No class scheduled");
            }
        }
        out.push('\n');
    }
    out
}

/// Print today's schedule to stdout.
pub async fn show(pipeline: &Pipeline, username: &str, password: &str) -> anyhow::Result<()> {
    let schedule = current_or_fail(pipeline, username, password).await?;
    print!("{}", render_schedule(&schedule));
    Ok(())
}
