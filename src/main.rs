//! Caretaker - health supervisor and backup orchestrator.
//!
//! Every subcommand is one short-lived task invocation, meant to be run by
//! an external scheduler. The task's `TaskError` class alone decides the
//! process exit code: `0` OK, `1` failure, `2` memory threshold exceeded.

mod cli;
mod cmd_inspect;
mod cmd_tasks;
mod context;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use caretaker_config::{ConfigLoader, ConfigValidator, SupervisorConfig, ValidationWarning};
use caretaker_core::{Layout, TaskError};

use crate::cli::{Cli, Commands};
use crate::context::Context;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing with console and file output.
///
/// Log files are written to `<root>/logs/debug/` with daily rotation. The
/// console layer writes to stderr so `list-backups` and `status` output stays
/// clean on stdout.
fn init_tracing(log_dir: &Path) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("caretaker")
        .filename_suffix("log")
        .max_log_files(14)
        .build(log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .try_init()?;

    Ok(guard)
}

/// Console-only tracing, used when the debug log directory is unusable.
fn init_console_tracing() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

/// Resolve file, environment and CLI settings, then validate.
fn load_config(cli: &Cli) -> Result<(SupervisorConfig, Vec<ValidationWarning>), TaskError> {
    let mut config = ConfigLoader::resolve(cli.config.as_deref())
        .map_err(|e| TaskError::CheckFailed(format!("configuration: {}", e)))?;
    if let Some(ref root) = cli.root {
        config.paths.root = root.clone();
    }

    let warnings = ConfigValidator::validate(&config)
        .into_result()
        .map_err(|e| TaskError::CheckFailed(format!("configuration: {}", e)))?;
    Ok((config, warnings))
}

async fn run(command: Commands, ctx: &Context) -> Result<(), TaskError> {
    match command {
        Commands::HealthCheck => cmd_tasks::health_check(ctx).await,
        Commands::MemoryAlert { threshold } => cmd_tasks::memory_alert(ctx, threshold).await,
        Commands::Backup => cmd_tasks::backup(ctx).await,
        Commands::SyncAndIndex => cmd_tasks::sync_and_index(ctx).await,
        Commands::Restore { snapshot } => cmd_tasks::restore(ctx, snapshot.as_deref()).await,
        Commands::ListBackups { format } => cmd_inspect::list_backups(ctx, format).await,
        Commands::Status { format } => cmd_inspect::status(ctx, format).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, warnings) = match load_config(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("caretaker: {}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    let layout = Layout::new(config.paths.root.clone());
    let _guard = match init_tracing(&layout.debug_dir()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            init_console_tracing();
            warn!("File logging disabled: {}", e);
            None
        }
    };

    for warning in &warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }

    if let Err(e) = layout.ensure() {
        error!("Cannot create {}: {}", layout.root().display(), e);
        return ExitCode::FAILURE;
    }

    let ctx = Context::new(config);
    debug!("Supervising {} from {}", ctx.service(), layout.root().display());

    match run(cli.command, &ctx).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{} [{}]", e, e.class());
            ExitCode::from(e.exit_code())
        }
    }
}
