//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::{MAX_RESTART_WINDOW_SECS, SupervisorConfig, threshold_in_range};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Collapse the errors into a single `ConfigError`, if any.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        if self.errors.is_empty() {
            return Ok(self.warnings);
        }
        let message = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        Err(ConfigError::Invalid(message))
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &SupervisorConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_service(config, &mut result);
        Self::validate_paths(config, &mut result);
        Self::validate_memory(config, &mut result);
        Self::validate_backup(config, &mut result);
        Self::validate_sync(config, &mut result);
        Self::validate_logs(config, &mut result);

        if config.alerts.webhook_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "alerts.webhook_timeout_secs",
                "webhook_timeout_secs must be greater than 0",
            ));
        }
        if let Some(ref url) = config.alerts.webhook_url {
            check_url("alerts.webhook_url", url, &mut result);
        }

        result
    }

    fn validate_service(config: &SupervisorConfig, result: &mut ValidationResult) {
        let service = &config.service;

        if service.name.trim().is_empty() {
            result.add_error(ValidationError::new(
                "service.name",
                "Service name cannot be empty",
            ));
        }

        check_url("service.health_url", &service.health_url, result);

        if service.probe_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "service.probe_timeout_secs",
                "probe_timeout_secs must be greater than 0",
            ));
        }

        if service.restart_window_secs == 0 {
            result.add_error(ValidationError::new(
                "service.restart_window_secs",
                "restart_window_secs must be greater than 0",
            ));
        } else if service.restart_window_secs > MAX_RESTART_WINDOW_SECS {
            result.add_error(ValidationError::new(
                "service.restart_window_secs",
                format!(
                    "restart_window_secs must be at most {}, got {}",
                    MAX_RESTART_WINDOW_SECS, service.restart_window_secs
                ),
            ));
        }

        if service.restart_ceiling == 0 {
            result.add_warning(ValidationWarning::new(
                "service.restart_ceiling",
                "restart_ceiling is 0, an unhealthy service will never be restarted",
            ));
        }

        if service.runtime.trim().is_empty() {
            result.add_error(ValidationError::new(
                "service.runtime",
                "Container runtime cannot be empty",
            ));
        }
    }

    fn validate_paths(config: &SupervisorConfig, result: &mut ValidationResult) {
        let paths = &config.paths;

        if paths.volume == paths.root {
            result.add_error(ValidationError::new(
                "paths.volume",
                "Volume cannot be the supervisor root",
            ));
        }

        if paths.root.starts_with(&paths.volume) {
            result.add_error(ValidationError::new(
                "paths.root",
                "Supervisor root cannot live inside the volume it backs up",
            ));
        }
    }

    fn validate_memory(config: &SupervisorConfig, result: &mut ValidationResult) {
        let threshold = config.memory.threshold_percent;
        if !threshold_in_range(threshold) {
            result.add_error(ValidationError::new(
                "memory.threshold_percent",
                format!("threshold_percent must be in (0, 100], got {}", threshold),
            ));
        }
    }

    fn validate_backup(config: &SupervisorConfig, result: &mut ValidationResult) {
        if config.backup.retention == 0 {
            result.add_error(ValidationError::new(
                "backup.retention",
                "retention must keep at least one snapshot",
            ));
        }
    }

    fn validate_sync(config: &SupervisorConfig, result: &mut ValidationResult) {
        let sync = &config.sync;

        match sync.source {
            None => result.add_warning(ValidationWarning::new(
                "sync.source",
                "sync.source is not set, sync-and-index cannot run",
            )),
            Some(ref source) if !source.exists() => result.add_warning(ValidationWarning::new(
                "sync.source",
                format!("Source path does not exist: {:?}", source),
            )),
            Some(_) => {}
        }

        if sync.remote_path.is_none() && sync.source.is_some() {
            result.add_warning(ValidationWarning::new(
                "sync.remote_path",
                "sync.remote_path is not set, sync-and-index cannot run",
            ));
        }

        check_url("sync.trigger_url", &sync.trigger_url, result);

        if sync.trigger_connect_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "sync.trigger_connect_timeout_ms",
                "trigger_connect_timeout_ms must be greater than 0",
            ));
        }

        if sync.trigger_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "sync.trigger_timeout_secs",
                "trigger_timeout_secs must be greater than 0",
            ));
        }

        if sync.trigger_timeout_secs > 60 {
            result.add_warning(ValidationWarning::new(
                "sync.trigger_timeout_secs",
                "trigger_timeout_secs is very high (>60), the reindex trigger is fire-and-forget",
            ));
        }
    }

    fn validate_logs(config: &SupervisorConfig, result: &mut ValidationResult) {
        if config.logs.max_bytes == 0 {
            result.add_error(ValidationError::new(
                "logs.max_bytes",
                "max_bytes must be greater than 0",
            ));
        }

        if config.logs.keep_lines == 0 {
            result.add_error(ValidationError::new(
                "logs.keep_lines",
                "keep_lines must be greater than 0",
            ));
        }
    }
}

fn check_url(path: &str, url: &str, result: &mut ValidationResult) {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        result.add_error(ValidationError::new(
            path,
            "URL must start with http:// or https://",
        ));
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
