//! Scripted process control for testing.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::CoreError;
use crate::process::{ProcessControl, ResourceUsage};

/// In-memory `ProcessControl` whose outcomes are set up front.
///
/// Every call is recorded as `"<verb> <name>"` so tests can assert on the
/// exact sequence of actions a task took.
#[derive(Debug, Default)]
pub struct ScriptedProcess {
    state: Mutex<ScriptState>,
}

#[derive(Debug, Default)]
struct ScriptState {
    running: bool,
    start_failures: VecDeque<String>,
    restart_failures: VecDeque<String>,
    stop_failure: Option<String>,
    usage: Option<ResourceUsage>,
    calls: Vec<String>,
}

impl ScriptedProcess {
    /// A process that is currently running (or not).
    pub fn new(running: bool) -> Self {
        Self {
            state: Mutex::new(ScriptState {
                running,
                ..Default::default()
            }),
        }
    }

    /// Report this sample from `resource_usage`.
    pub fn with_usage(self, usage: ResourceUsage) -> Self {
        self.state.lock().usage = Some(usage);
        self
    }

    /// Make the next `start` call fail.
    pub fn fail_next_start(&self, reason: impl Into<String>) {
        self.state.lock().start_failures.push_back(reason.into());
    }

    /// Make the next `restart` call fail.
    pub fn fail_next_restart(&self, reason: impl Into<String>) {
        self.state.lock().restart_failures.push_back(reason.into());
    }

    /// Make every `stop` call fail.
    pub fn fail_stop(&self, reason: impl Into<String>) {
        self.state.lock().stop_failure = Some(reason.into());
    }

    /// Whether the fake process is up.
    pub fn running(&self) -> bool {
        self.state.lock().running
    }

    /// Recorded calls, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Number of recorded calls with the given verb.
    pub fn count(&self, verb: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(verb))
            .count()
    }

    fn failed(verb: &str, name: &str, reason: String) -> CoreError {
        CoreError::CommandFailed {
            command: format!("{verb} {name}"),
            reason,
        }
    }
}

#[async_trait]
impl ProcessControl for ScriptedProcess {
    async fn is_running(&self, name: &str) -> Result<bool, CoreError> {
        let mut state = self.state.lock();
        state.calls.push(format!("is_running {name}"));
        Ok(state.running)
    }

    async fn start(&self, name: &str) -> Result<(), CoreError> {
        let mut state = self.state.lock();
        state.calls.push(format!("start {name}"));
        if let Some(reason) = state.start_failures.pop_front() {
            return Err(Self::failed("start", name, reason));
        }
        state.running = true;
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<(), CoreError> {
        let mut state = self.state.lock();
        state.calls.push(format!("stop {name}"));
        if let Some(reason) = state.stop_failure.clone() {
            return Err(Self::failed("stop", name, reason));
        }
        state.running = false;
        Ok(())
    }

    async fn restart(&self, name: &str) -> Result<(), CoreError> {
        let mut state = self.state.lock();
        state.calls.push(format!("restart {name}"));
        if let Some(reason) = state.restart_failures.pop_front() {
            return Err(Self::failed("restart", name, reason));
        }
        state.running = true;
        Ok(())
    }

    async fn resource_usage(&self, name: &str) -> Result<ResourceUsage, CoreError> {
        let mut state = self.state.lock();
        state.calls.push(format!("resource_usage {name}"));
        if !state.running {
            return Err(CoreError::Unavailable(format!("{name} is not running")));
        }
        state
            .usage
            .ok_or_else(|| CoreError::Unavailable("no usage scripted".to_string()))
    }
}
