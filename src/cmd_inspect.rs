//! Read-only subcommands: `list-backups` and `status`.

use caretaker_backup::Snapshot;
use caretaker_core::{TaskError, human_size};
use caretaker_monitor::{RestartLedger, restart_window};
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::cli::OutputFormat;
use crate::context::Context;

const CREATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) async fn list_backups(ctx: &Context, format: OutputFormat) -> Result<(), TaskError> {
    let snapshots = ctx
        .backup()
        .snapshots()
        .await
        .map_err(|e| TaskError::CheckFailed(e.to_string()))?;
    print!("{}", render_backups(&snapshots, format));
    Ok(())
}

fn render_backups(snapshots: &[Snapshot], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = snapshots
                .iter()
                .map(|s| {
                    json!({
                        "name": s.name,
                        "path": s.path,
                        "size_bytes": s.size_bytes,
                        "created_at": s.created_at.format(CREATED_FORMAT).to_string(),
                    })
                })
                .collect();
            format!("{:#}\n", serde_json::Value::Array(entries))
        }
        OutputFormat::Table => {
            if snapshots.is_empty() {
                return "No backups found.\n".to_string();
            }
            let mut out = format!("{:<40} {:>10}  {}\n", "NAME", "SIZE", "CREATED");
            out.push_str(&"-".repeat(72));
            out.push('\n');
            for s in snapshots {
                out.push_str(&format!(
                    "{:<40} {:>10}  {}\n",
                    s.name,
                    human_size(s.size_bytes),
                    s.created_at.format(CREATED_FORMAT)
                ));
            }
            out
        }
    }
}

/// Point-in-time view of the supervised service.
#[derive(Debug, Serialize)]
pub(crate) struct StatusReport {
    pub service: String,
    /// `None` when the runtime could not be queried.
    pub running: Option<bool>,
    pub latest_backup: Option<String>,
    pub latest_backup_at: Option<NaiveDateTime>,
    pub backed_up_today: bool,
    pub backups: usize,
    pub restarts_in_window: usize,
    pub restart_ceiling: u32,
    pub restart_window_secs: u64,
}

pub(crate) async fn status(ctx: &Context, format: OutputFormat) -> Result<(), TaskError> {
    let report = collect_status(ctx).await?;
    print!("{}", render_status(&report, format));
    Ok(())
}

async fn collect_status(ctx: &Context) -> Result<StatusReport, TaskError> {
    let running = match ctx.process.is_running(ctx.service()).await {
        Ok(running) => Some(running),
        Err(e) => {
            warn!("Cannot query state of {}: {}", ctx.service(), e);
            None
        }
    };

    let snapshots = ctx
        .backup()
        .snapshots()
        .await
        .map_err(|e| TaskError::CheckFailed(e.to_string()))?;
    let latest = snapshots.first();
    let today = ctx.clock.today();

    let ledger = RestartLedger::read(ctx.layout.restart_ledger_path())
        .map_err(|e| TaskError::CheckFailed(e.to_string()))?;
    let service = &ctx.config.service;
    let window = restart_window(service.restart_window_secs)
        .map_err(|e| TaskError::CheckFailed(e.to_string()))?;

    Ok(StatusReport {
        service: service.name.clone(),
        running,
        latest_backup: latest.map(|s| s.name.clone()),
        latest_backup_at: latest.map(|s| s.created_at),
        backed_up_today: snapshots.iter().any(|s| s.created_at.date() == today),
        backups: snapshots.len(),
        restarts_in_window: ledger.started_within(ctx.clock.now(), window),
        restart_ceiling: service.restart_ceiling,
        restart_window_secs: service.restart_window_secs,
    })
}

fn render_status(report: &StatusReport, format: OutputFormat) -> String {
    if format == OutputFormat::Json {
        return match serde_json::to_value(report) {
            Ok(value) => format!("{:#}\n", value),
            Err(e) => format!("{{\"error\": {:?}}}\n", e.to_string()),
        };
    }

    let yes_no = |b: bool| if b { "yes" } else { "no" };
    let running = report.running.map(yes_no).unwrap_or("unknown");
    let latest = match (&report.latest_backup, report.latest_backup_at) {
        (Some(name), Some(at)) => format!("{} ({})", name, at.format(CREATED_FORMAT)),
        _ => "none".to_string(),
    };

    format!(
        "service:          {}\n\
         running:          {}\n\
         latest backup:    {}\n\
         backed up today:  {}\n\
         backups kept:     {}\n\
         restarts:         {}/{} in last {}s\n",
        report.service,
        running,
        latest,
        yes_no(report.backed_up_today),
        report.backups,
        report.restarts_in_window,
        report.restart_ceiling,
        report.restart_window_secs
    )
}
