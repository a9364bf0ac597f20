//! Snapshot storage.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tar::{Archive, Builder};
use tracing::{debug, warn};

use crate::error::BackupError;
use crate::snapshot::Snapshot;

/// Snapshot storage trait.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Archive the contents of `source` as a snapshot taken at `created_at`.
    async fn create(&self, source: &Path, created_at: NaiveDateTime)
    -> Result<Snapshot, BackupError>;

    /// All snapshots, oldest first.
    async fn list(&self) -> Result<Vec<Snapshot>, BackupError>;

    /// Delete a snapshot.
    async fn delete(&self, snapshot: &Snapshot) -> Result<(), BackupError>;

    /// Extract a snapshot into `dest`, which is created if needed.
    async fn extract(&self, snapshot: &Snapshot, dest: &Path) -> Result<(), BackupError>;
}

/// In-memory snapshot store for testing.
///
/// `create` captures the regular files under the source directory so that
/// `extract` can reproduce them.
pub struct MemorySnapshotStore {
    service: String,
    snapshots: tokio::sync::RwLock<BTreeMap<NaiveDateTime, StoredSnapshot>>,
    fail_create: AtomicBool,
}

struct StoredSnapshot {
    snapshot: Snapshot,
    files: Vec<(PathBuf, Vec<u8>)>,
}

impl MemorySnapshotStore {
    /// Create an empty store for `service`.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            snapshots: tokio::sync::RwLock::new(BTreeMap::new()),
            fail_create: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `create` fail.
    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Seed an empty snapshot taken at `created_at`.
    pub async fn insert(&self, created_at: NaiveDateTime) -> Snapshot {
        let name = Snapshot::file_name(&self.service, created_at);
        let snapshot = Snapshot {
            path: PathBuf::from(&name),
            name,
            size_bytes: 0,
            created_at,
        };
        self.snapshots.write().await.insert(
            created_at,
            StoredSnapshot {
                snapshot: snapshot.clone(),
                files: Vec::new(),
            },
        );
        snapshot
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn create(
        &self,
        source: &Path,
        created_at: NaiveDateTime,
    ) -> Result<Snapshot, BackupError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(BackupError::Archive("No space left on device".to_string()));
        }
        if !source.is_dir() {
            return Err(BackupError::VolumeUnavailable(source.to_path_buf()));
        }

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(source).sort_by_file_name() {
            let entry = entry.map_err(|e| BackupError::Archive(e.to_string()))?;
            if entry.file_type().is_file() {
                let relative = entry
                    .path()
                    .strip_prefix(source)
                    .map_err(|e| BackupError::Archive(e.to_string()))?;
                files.push((relative.to_path_buf(), fs::read(entry.path())?));
            }
        }

        let name = Snapshot::file_name(&self.service, created_at);
        let snapshot = Snapshot {
            path: PathBuf::from(&name),
            name,
            size_bytes: files.iter().map(|(_, data)| data.len() as u64).sum(),
            created_at,
        };
        self.snapshots.write().await.insert(
            created_at,
            StoredSnapshot {
                snapshot: snapshot.clone(),
                files,
            },
        );
        Ok(snapshot)
    }

    async fn list(&self) -> Result<Vec<Snapshot>, BackupError> {
        let store = self.snapshots.read().await;
        Ok(store.values().map(|s| s.snapshot.clone()).collect())
    }

    async fn delete(&self, snapshot: &Snapshot) -> Result<(), BackupError> {
        let mut store = self.snapshots.write().await;
        store.remove(&snapshot.created_at);
        Ok(())
    }

    async fn extract(&self, snapshot: &Snapshot, dest: &Path) -> Result<(), BackupError> {
        let store = self.snapshots.read().await;
        let stored = store
            .get(&snapshot.created_at)
            .ok_or_else(|| BackupError::NotFound(snapshot.name.clone()))?;

        fs::create_dir_all(dest)?;
        for (relative, data) in &stored.files {
            let path = dest.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, data)?;
        }
        Ok(())
    }
}

/// File system snapshot store writing gzip-compressed tar archives.
///
/// ```text
/// {backups_dir}/
/// ├── {service}-{YYYYMMDD_HHMMSS}.tar.gz
/// └── ...
/// ```
///
/// Archives are written to a hidden `.partial` file and renamed into place,
/// so `list` never sees a half-written snapshot.
pub struct FileSnapshotStore {
    dir: PathBuf,
    service: String,
}

impl FileSnapshotStore {
    /// Create a store for `service` in `dir`.
    pub fn new(dir: impl Into<PathBuf>, service: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            service: service.into(),
        }
    }

    /// The backups directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_archive(source: &Path, target: &Path) -> Result<(), BackupError> {
        let file = File::create(target)?;
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        let mut tar = Builder::new(encoder);
        tar.follow_symlinks(false);

        for entry in walkdir::WalkDir::new(source).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| BackupError::Archive(e.to_string()))?;
            let path = entry.path();
            let relative = path
                .strip_prefix(source)
                .map_err(|e| BackupError::Archive(format!("Path error: {}", e)))?;

            let added = if entry.file_type().is_dir() {
                tar.append_dir(relative, path)
            } else {
                debug!("Adding to archive: {}", relative.display());
                tar.append_path_with_name(path, relative)
            };
            added.map_err(|e| {
                BackupError::Archive(format!("Failed to add {}: {}", path.display(), e))
            })?;
        }

        let encoder = tar
            .into_inner()
            .map_err(|e| BackupError::Archive(format!("Failed to finalize archive: {}", e)))?;
        let mut writer = encoder
            .finish()
            .map_err(|e| BackupError::Archive(format!("Failed to compress archive: {}", e)))?;
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| BackupError::Io(e.into_error()))?;
        file.sync_all()?;
        Ok(())
    }

    fn snapshot_at(&self, path: PathBuf) -> Result<Option<Snapshot>, BackupError> {
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            return Ok(None);
        };
        let Some(created_at) = Snapshot::parse_file_name(&self.service, &name) else {
            return Ok(None);
        };
        let size_bytes = fs::metadata(&path)?.len();
        Ok(Some(Snapshot {
            name,
            path,
            size_bytes,
            created_at,
        }))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn create(
        &self,
        source: &Path,
        created_at: NaiveDateTime,
    ) -> Result<Snapshot, BackupError> {
        if !source.is_dir() {
            return Err(BackupError::VolumeUnavailable(source.to_path_buf()));
        }
        tokio::fs::create_dir_all(&self.dir).await?;

        let name = Snapshot::file_name(&self.service, created_at);
        let path = self.dir.join(&name);
        if path.exists() {
            return Err(BackupError::Archive(format!("{} already exists", name)));
        }
        let partial = self.dir.join(format!(".{}.partial", name));

        let source = source.to_path_buf();
        let target = partial.clone();
        let written =
            tokio::task::spawn_blocking(move || Self::write_archive(&source, &target)).await;

        if let Err(e) = written.map_err(BackupError::from).and_then(|r| r) {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                warn!("Failed to remove {}: {}", partial.display(), cleanup);
            }
            return Err(e);
        }

        tokio::fs::rename(&partial, &path).await?;
        let size_bytes = tokio::fs::metadata(&path).await?.len();

        Ok(Snapshot {
            name,
            path,
            size_bytes,
            created_at,
        })
    }

    async fn list(&self) -> Result<Vec<Snapshot>, BackupError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut snapshots = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(snapshot) = self.snapshot_at(entry.path())? {
                snapshots.push(snapshot);
            }
        }

        snapshots.sort_by_key(|s| s.created_at);
        Ok(snapshots)
    }

    async fn delete(&self, snapshot: &Snapshot) -> Result<(), BackupError> {
        tokio::fs::remove_file(&snapshot.path).await?;
        debug!("Deleted snapshot {}", snapshot.name);
        Ok(())
    }

    async fn extract(&self, snapshot: &Snapshot, dest: &Path) -> Result<(), BackupError> {
        if !snapshot.path.exists() {
            return Err(BackupError::NotFound(snapshot.name.clone()));
        }

        let archive_path = snapshot.path.clone();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<(), BackupError> {
            fs::create_dir_all(&dest)?;
            let decoder = GzDecoder::new(File::open(&archive_path)?);
            let mut archive = Archive::new(decoder);
            archive.set_preserve_permissions(true);
            archive
                .unpack(&dest)
                .map_err(|e| BackupError::Archive(format!("Failed to extract archive: {}", e)))
        })
        .await?
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
