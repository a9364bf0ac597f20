//! # Caretaker Core
//!
//! Building blocks shared by every supervisor task.
//!
//! ## Features
//!
//! - Injectable wall clock (`Clock`, `SystemClock`, `ManualClock`)
//! - Size-capped, append-only line journal (`Journal`)
//! - Task failure taxonomy and exit code mapping (`TaskError`, `FailureClass`)
//! - On-disk layout under the supervisor root (`Layout`)
//! - Managed process control through a container runtime CLI (`ProcessControl`)
//!   and a scripted double for tests (`ScriptedProcess`)

pub mod clock;
pub mod error;
pub mod journal;
pub mod layout;
pub mod process;
pub mod scripted;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, Degradation, FailureClass, TaskError};
pub use journal::{Journal, LogCap};
pub use layout::{Layout, LogKind};
pub use process::{ContainerRuntime, ProcessControl, ResourceUsage, human_size};
pub use scripted::ScriptedProcess;
