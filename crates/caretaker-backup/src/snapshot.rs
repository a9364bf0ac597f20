//! Snapshot model and file naming.
//!
//! Snapshots are named `{service}-{YYYYMMDD_HHMMSS}.tar.gz`. The timestamp is
//! zero-padded and most-significant first, so lexical and chronological
//! order agree.

use std::path::PathBuf;

use chrono::NaiveDateTime;

/// Timestamp part of a snapshot file name.
pub const NAME_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Snapshot file extension.
pub const SNAPSHOT_EXTENSION: &str = ".tar.gz";

/// A stored snapshot of the volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// File name, e.g. `search-index-20260314_020000.tar.gz`.
    pub name: String,
    /// Location of the archive.
    pub path: PathBuf,
    /// Archive size.
    pub size_bytes: u64,
    /// Creation time encoded in the name.
    pub created_at: NaiveDateTime,
}

impl Snapshot {
    /// File name for a snapshot of `service` taken at `created_at`.
    pub fn file_name(service: &str, created_at: NaiveDateTime) -> String {
        format!(
            "{}-{}{}",
            service,
            created_at.format(NAME_TIMESTAMP_FORMAT),
            SNAPSHOT_EXTENSION
        )
    }

    /// Recover the creation time from a snapshot file name of `service`.
    ///
    /// Returns `None` for files that are not snapshots of this service.
    pub fn parse_file_name(service: &str, name: &str) -> Option<NaiveDateTime> {
        let stem = name.strip_suffix(SNAPSHOT_EXTENSION)?;
        let timestamp = stem.strip_prefix(service)?.strip_prefix('-')?;
        NaiveDateTime::parse_from_str(timestamp, NAME_TIMESTAMP_FORMAT).ok()
    }
}
