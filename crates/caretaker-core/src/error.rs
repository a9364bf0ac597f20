//! Error types and the task failure taxonomy.
//!
//! Capabilities (process control, journals, archives) fail with their own
//! error enums. Task entry points collapse those into a [`TaskError`], whose
//! [`FailureClass`] alone decides the process exit code.

use thiserror::Error;

/// Errors raised by core capabilities.
#[derive(Debug, Error)]
pub enum CoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// External command exited unsuccessfully.
    #[error("Command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    /// External command did not finish in time.
    #[error("Command `{command}` timed out after {secs}s")]
    CommandTimeout { command: String, secs: u64 },

    /// Output could not be parsed.
    #[error("Failed to parse {what}: {input:?}")]
    Parse { what: &'static str, input: String },

    /// Requested information is not available.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Persisted state file is unreadable.
    #[error("State file error: {0}")]
    State(String),
}

/// How a failure is handled by the scheduler-facing entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Retried on the next scheduled invocation; logged, not fatal.
    Transient,
    /// A monitored value crossed its threshold.
    Threshold,
    /// Automatic recovery gave up; an operator must step in.
    ExhaustedRetry,
    /// Continuing would risk losing data.
    DataLossRisk,
    /// Optional follow-up work failed after the main work succeeded.
    BestEffort,
    /// The check itself could not be performed.
    CheckFailed,
}

impl FailureClass {
    /// Process exit code for this class.
    pub fn exit_code(self) -> u8 {
        match self {
            FailureClass::Transient | FailureClass::BestEffort => 0,
            FailureClass::Threshold => 2,
            FailureClass::ExhaustedRetry
            | FailureClass::DataLossRisk
            | FailureClass::CheckFailed => 1,
        }
    }

    /// Whether this class ends the invocation.
    pub fn is_fatal(self) -> bool {
        !matches!(self, FailureClass::Transient | FailureClass::BestEffort)
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureClass::Transient => write!(f, "transient"),
            FailureClass::Threshold => write!(f, "threshold"),
            FailureClass::ExhaustedRetry => write!(f, "exhausted_retry"),
            FailureClass::DataLossRisk => write!(f, "data_loss_risk"),
            FailureClass::BestEffort => write!(f, "best_effort"),
            FailureClass::CheckFailed => write!(f, "check_failed"),
        }
    }
}

/// A non-fatal problem a task logged and carried on from.
#[derive(Debug, Clone, PartialEq)]
pub struct Degradation {
    pub class: FailureClass,
    pub message: String,
}

impl Degradation {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Transient,
            message: message.into(),
        }
    }

    pub fn best_effort(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::BestEffort,
            message: message.into(),
        }
    }
}

/// Fatal outcome of a task invocation.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Resource usage at or above the configured threshold.
    #[error("Memory usage {percent:.1}% is at or above threshold {threshold:.1}%")]
    ThresholdExceeded { percent: f64, threshold: f64 },

    /// Restart ceiling reached.
    #[error("Restart ceiling reached ({restarts}/{ceiling}); manual intervention required")]
    RestartCeiling { restarts: usize, ceiling: u32 },

    /// Snapshot creation failed.
    #[error("Backup failed: {0}")]
    BackupFailed(String),

    /// Restore did not complete.
    #[error("Restore failed: {0}")]
    RestoreFailed(String),

    /// Mirror step failed.
    #[error("Mirror failed: {0}")]
    MirrorFailed(String),

    /// The check could not be carried out.
    #[error("Check failed: {0}")]
    CheckFailed(String),
}

impl TaskError {
    /// Classify this error.
    pub fn class(&self) -> FailureClass {
        match self {
            TaskError::ThresholdExceeded { .. } => FailureClass::Threshold,
            TaskError::RestartCeiling { .. } => FailureClass::ExhaustedRetry,
            TaskError::BackupFailed(_) | TaskError::RestoreFailed(_) => FailureClass::DataLossRisk,
            TaskError::MirrorFailed(_) | TaskError::CheckFailed(_) => FailureClass::CheckFailed,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        self.class().exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_exit_code_is_distinct() {
        let err = TaskError::ThresholdExceeded {
            percent: 80.0,
            threshold: 80.0,
        };
        assert_eq!(err.class(), FailureClass::Threshold);
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("80.0%"));
    }

    #[test]
    fn test_fatal_classes_exit_one() {
        let errors = vec![
            TaskError::RestartCeiling {
                restarts: 3,
                ceiling: 3,
            },
            TaskError::BackupFailed("disk full".to_string()),
            TaskError::RestoreFailed("no snapshot".to_string()),
            TaskError::MirrorFailed("rsync exited 23".to_string()),
            TaskError::CheckFailed("container absent".to_string()),
        ];

        for err in errors {
            assert_eq!(err.exit_code(), 1, "{err}");
            assert!(err.class().is_fatal());
        }
    }

    #[test]
    fn test_non_fatal_classes() {
        assert!(!FailureClass::Transient.is_fatal());
        assert!(!FailureClass::BestEffort.is_fatal());
        assert_eq!(FailureClass::Transient.exit_code(), 0);
        assert_eq!(FailureClass::BestEffort.exit_code(), 0);
    }

    #[test]
    fn test_restart_ceiling_message() {
        let err = TaskError::RestartCeiling {
            restarts: 3,
            ceiling: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("3/3"));
        assert!(msg.contains("manual intervention"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CoreError = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_degradation_constructors() {
        assert_eq!(Degradation::transient("x").class, FailureClass::Transient);
        assert_eq!(Degradation::best_effort("y").class, FailureClass::BestEffort);
    }
}
