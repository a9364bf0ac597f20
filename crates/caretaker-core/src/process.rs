//! Managed process control.
//!
//! The supervisor never talks to the managed service's internals; it only
//! asks a container runtime CLI (`docker` by default) to report on and act
//! on the process by name.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::CoreError;

/// Point-in-time memory usage of the managed process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub used_bytes: u64,
    pub limit_bytes: u64,
    pub percent: f64,
}

impl ResourceUsage {
    /// Build a sample, deriving the percentage from used and limit.
    pub fn from_bytes(used_bytes: u64, limit_bytes: u64) -> Self {
        let percent = if limit_bytes == 0 {
            0.0
        } else {
            used_bytes as f64 * 100.0 / limit_bytes as f64
        };
        Self {
            used_bytes,
            limit_bytes,
            percent,
        }
    }
}

/// Start/stop/inspect capability for the managed process.
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// Whether the process is currently running.
    async fn is_running(&self, name: &str) -> Result<bool, CoreError>;

    /// Start a stopped process.
    async fn start(&self, name: &str) -> Result<(), CoreError>;

    /// Stop a running process.
    async fn stop(&self, name: &str) -> Result<(), CoreError>;

    /// Restart the process.
    async fn restart(&self, name: &str) -> Result<(), CoreError>;

    /// Current memory usage and limit.
    async fn resource_usage(&self, name: &str) -> Result<ResourceUsage, CoreError>;
}

/// `ProcessControl` backed by a docker-compatible CLI.
#[derive(Debug, Clone)]
pub struct ContainerRuntime {
    binary: String,
    timeout: Duration,
}

impl ContainerRuntime {
    /// Create a runtime driving `binary` (e.g. `docker` or `podman`).
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Set the per-command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, args: &[&str]) -> Result<String, CoreError> {
        let command = format!("{} {}", self.binary, args.join(" "));
        debug!("Running {}", command);

        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| CoreError::CommandTimeout {
                command: command.clone(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| CoreError::CommandFailed {
                command: command.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CoreError::CommandFailed {
                command,
                reason: format!(
                    "exit code {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl ProcessControl for ContainerRuntime {
    async fn is_running(&self, name: &str) -> Result<bool, CoreError> {
        match self
            .run(&["inspect", "--format", "{{.State.Running}}", name])
            .await
        {
            Ok(out) => Ok(out == "true"),
            // `inspect` fails for a container that does not exist.
            Err(CoreError::CommandFailed { reason, .. }) => {
                debug!("{} inspect {} failed: {}", self.binary, name, reason);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn start(&self, name: &str) -> Result<(), CoreError> {
        self.run(&["start", name]).await?;
        info!("Started {}", name);
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<(), CoreError> {
        self.run(&["stop", name]).await?;
        info!("Stopped {}", name);
        Ok(())
    }

    async fn restart(&self, name: &str) -> Result<(), CoreError> {
        self.run(&["restart", name]).await?;
        info!("Restarted {}", name);
        Ok(())
    }

    async fn resource_usage(&self, name: &str) -> Result<ResourceUsage, CoreError> {
        let out = self
            .run(&[
                "stats",
                "--no-stream",
                "--format",
                "{{.MemUsage}}|{{.MemPerc}}",
                name,
            ])
            .await?;
        parse_stats_line(&out)
    }
}

/// Parse a `docker stats` line of the form `512MiB / 2GiB|25.00%`.
pub fn parse_stats_line(line: &str) -> Result<ResourceUsage, CoreError> {
    let parse_err = || CoreError::Parse {
        what: "memory stats",
        input: line.to_string(),
    };

    let (usage, percent) = line.trim().split_once('|').ok_or_else(parse_err)?;
    let (used, limit) = usage.split_once('/').ok_or_else(parse_err)?;
    let used_bytes = parse_size(used)?;
    let limit_bytes = parse_size(limit)?;

    if limit_bytes == 0 {
        return Err(CoreError::Unavailable(
            "no memory limit reported for process".to_string(),
        ));
    }

    let mut sample = ResourceUsage::from_bytes(used_bytes, limit_bytes);
    if let Ok(reported) = percent.trim().trim_end_matches('%').parse::<f64>() {
        sample.percent = reported;
    }
    Ok(sample)
}

/// Parse a human-readable size such as `1.5GiB`, `100kB` or `4g`.
pub fn parse_size(input: &str) -> Result<u64, CoreError> {
    let s = input.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);

    let value: f64 = number.parse().map_err(|_| CoreError::Parse {
        what: "size",
        input: input.to_string(),
    })?;

    let multiplier: f64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1.0,
        "k" | "kb" => 1e3,
        "m" | "mb" => 1e6,
        "g" | "gb" => 1e9,
        "t" | "tb" => 1e12,
        "kib" => 1024.0,
        "mib" => 1024.0 * 1024.0,
        "gib" => 1024.0 * 1024.0 * 1024.0,
        "tib" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => {
            return Err(CoreError::Parse {
                what: "size unit",
                input: input.to_string(),
            });
        }
    };

    Ok((value * multiplier).round() as u64)
}

/// Format a byte count for logs (`1.5 MiB`).
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
