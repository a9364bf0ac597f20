//! Task subcommand handlers.
//!
//! Each handler runs one task and returns its `TaskError` untouched; the
//! exit code is decided in `main`.

use caretaker_core::{Degradation, TaskError, human_size};
use tracing::{info, warn};

use crate::context::Context;

pub(crate) async fn health_check(ctx: &Context) -> Result<(), TaskError> {
    let report = ctx.health_monitor()?.run().await?;

    info!("{}: {}", ctx.service(), report.record.format_line());
    if report.started {
        info!("{} was started", ctx.service());
    }
    if report.restarted {
        info!(
            "{} was restarted ({}/{} in window)",
            ctx.service(),
            report.restarts_in_window,
            ctx.config.service.restart_ceiling
        );
    }
    if let Some(snapshot) = report.catch_up {
        info!("Catch-up backup: {}", snapshot.name);
    }
    log_degradations(&report.degradations);
    Ok(())
}

pub(crate) async fn memory_alert(ctx: &Context, threshold: Option<f64>) -> Result<(), TaskError> {
    let sample = ctx.watchdog().run(threshold).await?;
    info!("{}: {}", ctx.service(), sample.format_line());
    Ok(())
}

pub(crate) async fn backup(ctx: &Context) -> Result<(), TaskError> {
    match ctx.backup().run().await {
        Ok(report) => {
            info!(
                "Backup created: {} ({})",
                report.snapshot.name,
                human_size(report.snapshot.size_bytes)
            );
            for snapshot in &report.deleted {
                info!("Rotated out {}", snapshot.name);
            }
            log_degradations(&report.degradations);
            Ok(())
        }
        Err(e) => {
            ctx.alerts().critical("Backup", e.to_string()).await;
            Err(e)
        }
    }
}

pub(crate) async fn sync_and_index(ctx: &Context) -> Result<(), TaskError> {
    let task = ctx.sync_task()?;
    match task.run().await {
        Ok(report) => {
            info!(
                "Mirrored {} to {}: {} transferred, {} deleted",
                report.source.display(),
                report.destination,
                report.stats.transferred,
                report.stats.deleted
            );
            if let Some(outcome) = report.trigger {
                info!("Reindex {}", outcome);
            }
            log_degradations(&report.degradations);
            Ok(())
        }
        Err(e) => {
            ctx.alerts().alert("Sync", e.to_string()).await;
            Err(e)
        }
    }
}

pub(crate) async fn restore(ctx: &Context, snapshot: Option<&str>) -> Result<(), TaskError> {
    match ctx.restore().run(snapshot).await {
        Ok(report) => {
            info!("Restored {}", report.snapshot.name);
            if let Some(previous) = report.previous {
                info!("Previous volume kept at {}", previous.display());
            }
            Ok(())
        }
        Err(e) => {
            ctx.alerts().critical("Restore", e.to_string()).await;
            Err(e)
        }
    }
}

fn log_degradations(degradations: &[Degradation]) {
    for degradation in degradations {
        warn!("{} ({})", degradation.message, degradation.class);
    }
}
