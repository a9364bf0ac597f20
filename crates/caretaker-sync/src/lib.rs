//! # Caretaker Sync
//!
//! One-way mirror of a local tree to the managed service's host, followed
//! by a fire-and-forget request asking the service to reindex.
//!
//! ## Features
//!
//! - `rsync -az --delete` mirror over ssh with name-pattern excludes
//! - Local directory mirror with the same semantics
//! - Reindex trigger whose timeout governs only request acceptance

pub mod error;
pub mod mirror;
pub mod task;
pub mod trigger;

pub use error::SyncError;
pub use mirror::{LocalMirror, Mirror, MirrorStats, RsyncMirror, mirror_from_config};
pub use task::{SyncReport, SyncTask};
pub use trigger::{ReindexTrigger, TriggerOutcome};
