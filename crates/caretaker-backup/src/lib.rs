//! # Caretaker Backup
//!
//! Snapshots of the managed service's persistent volume.
//!
//! ## Features
//!
//! - Timestamp-named gzip tar snapshots (`FileSnapshotStore`)
//! - Retention rotation that only runs after a successful snapshot
//! - Catch-up lookup of today's snapshot
//! - Restore with the previous volume kept aside

pub mod error;
pub mod orchestrator;
pub mod restore;
pub mod snapshot;
pub mod store;

pub use error::BackupError;
pub use orchestrator::{BackupOrchestrator, BackupReport};
pub use restore::{RestoreManager, RestoreReport};
pub use snapshot::Snapshot;
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
