/// Backup snapshots and retention
///
/// A snapshot is a directory `backup_<YYYYmmdd_HHMMSS>` under the backup
/// root holding verbatim copies of the configured sources. Sources that do
/// not exist are recorded as skipped rather than failing the snapshot.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::utils::{backup_dir_name, dir_size, parse_backup_dir_name};

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Failed to create backup directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to read backup root {path}: {source}")]
    ReadRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove backup {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Refusing to prune with keep = 0")]
    InvalidKeep,
}

/// What happened to one snapshot source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Copied { bytes: u64 },
    Skipped,
}

#[derive(Debug, Clone)]
pub struct SnapshotItem {
    pub source: PathBuf,
    pub status: ItemStatus,
}

/// Result of a snapshot run
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub dir: PathBuf,
    pub items: Vec<SnapshotItem>,
}

/// An existing backup directory
#[derive(Debug, Clone, Serialize)]
pub struct BackupEntry {
    pub name: String,
    pub path: PathBuf,
    pub created: NaiveDateTime,
    pub size_bytes: u64,
}

pub struct BackupManager {
    backup_root: PathBuf,
}

impl BackupManager {
    pub fn new<P: AsRef<Path>>(backup_root: P) -> Self {
        Self {
            backup_root: backup_root.as_ref().to_path_buf(),
        }
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Create `backup_<timestamp>` and copy every existing source into it
    pub fn create_snapshot(
        &self,
        sources: &[PathBuf],
        at: DateTime<Local>,
    ) -> Result<Snapshot, BackupError> {
        let dir = self.backup_root.join(backup_dir_name(at));
        fs::create_dir_all(&dir).map_err(|source| BackupError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        info!(dir = %dir.display(), "Created backup directory");

        let mut items = Vec::with_capacity(sources.len());
        for source in sources {
            // exists() follows links: a dangling link is treated as absent
            let status = if source.exists() {
                let name = source.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("root"));
                let bytes = copy_recursive(source, &dir.join(name))?;
                ItemStatus::Copied { bytes }
            } else {
                debug!(source = %source.display(), "Snapshot source absent, skipping");
                ItemStatus::Skipped
            };
            items.push(SnapshotItem {
                source: source.clone(),
                status,
            });
        }

        Ok(Snapshot { dir, items })
    }

    /// All backup directories, newest first. A missing backup root yields an empty list.
    pub fn list_backups(&self) -> Result<Vec<BackupEntry>, BackupError> {
        let read_dir = match fs::read_dir(&self.backup_root) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(BackupError::ReadRoot {
                    path: self.backup_root.clone(),
                    source,
                })
            }
        };

        let mut entries: Vec<BackupEntry> = read_dir
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                let created = parse_backup_dir_name(&name)?;
                let path = entry.path();
                Some(BackupEntry {
                    size_bytes: dir_size(&path),
                    name,
                    path,
                    created,
                })
            })
            .collect();

        entries.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(entries)
    }

    /// Remove all but the `keep` newest backups. Returns the removed (or, on dry run, removable) paths.
    pub fn prune(&self, keep: usize, dry_run: bool) -> Result<Vec<PathBuf>, BackupError> {
        if keep == 0 {
            return Err(BackupError::InvalidKeep);
        }

        let mut removed = Vec::new();
        for entry in self.list_backups()?.into_iter().skip(keep) {
            if !dry_run {
                fs::remove_dir_all(&entry.path).map_err(|source| BackupError::Remove {
                    path: entry.path.clone(),
                    source,
                })?;
                info!(path = %entry.path.display(), "Removed old backup");
            }
            removed.push(entry.path);
        }
        Ok(removed)
    }
}

/// Copy a file or directory tree verbatim. Returns bytes of regular files copied.
fn copy_recursive(src: &Path, dst: &Path) -> Result<u64, BackupError> {
    let copy_err = |from: &Path, to: &Path, source: io::Error| BackupError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    let mut bytes = 0;
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|source| BackupError::Walk {
            path: src.to_path_buf(),
            source,
        })?;

        let relative = entry.path().strip_prefix(src).unwrap_or(Path::new(""));
        let target = if relative.as_os_str().is_empty() {
            dst.to_path_buf()
        } else {
            dst.join(relative)
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| copy_err(entry.path(), &target, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target).map_err(|e| copy_err(entry.path(), &target, e))?;
        } else {
            bytes += fs::copy(entry.path(), &target).map_err(|e| copy_err(entry.path(), &target, e))?;
        }
    }

    Ok(bytes)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    let link = fs::read_link(src)?;
    remove_existing(dst)?;
    std::os::unix::fs::symlink(link, dst)
}

/// Clear a target left by an earlier snapshot taken within the same second
#[cfg(unix)]
fn remove_existing(dst: &Path) -> io::Result<()> {
    match fs::symlink_metadata(dst) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(dst),
        Ok(_) => fs::remove_file(dst),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    fs::copy(src, dst).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(sec: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 12, 0, sec).unwrap()
    }

    #[test]
    fn test_snapshot_copies_present_and_skips_absent() {
        let project = tempfile::tempdir().unwrap();
        let root = project.path();
        fs::create_dir_all(root.join("data/nested")).unwrap();
        fs::write(root.join("data/a.txt"), "x").unwrap();
        fs::write(root.join("data/nested/b.bin"), [0u8, 1, 2, 255]).unwrap();
        fs::write(root.join("global_config.yml"), "key: value\n").unwrap();

        let manager = BackupManager::new(root.join("backups"));
        let sources = vec![root.join("data"), root.join("logs"), root.join("global_config.yml")];
        let snapshot = manager.create_snapshot(&sources, at(0)).unwrap();

        assert_eq!(snapshot.dir, root.join("backups/backup_20240501_120000"));
        assert_eq!(fs::read_to_string(snapshot.dir.join("data/a.txt")).unwrap(), "x");
        assert_eq!(fs::read(snapshot.dir.join("data/nested/b.bin")).unwrap(), vec![0u8, 1, 2, 255]);
        assert_eq!(
            fs::read_to_string(snapshot.dir.join("global_config.yml")).unwrap(),
            "key: value\n"
        );
        assert!(!snapshot.dir.join("logs").exists());

        let skipped: Vec<_> = snapshot
            .items
            .iter()
            .filter(|i| i.status == ItemStatus::Skipped)
            .map(|i| i.source.clone())
            .collect();
        assert_eq!(skipped, vec![root.join("logs")]);
        assert_eq!(snapshot.items[0].status, ItemStatus::Copied { bytes: 5 });
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_link_is_skipped() {
        let project = tempfile::tempdir().unwrap();
        let root = project.path();
        std::os::unix::fs::symlink(root.join("missing.yml"), root.join("global_config.yml")).unwrap();

        let manager = BackupManager::new(root.join("backups"));
        let snapshot = manager
            .create_snapshot(&[root.join("global_config.yml")], at(0))
            .unwrap();

        assert_eq!(snapshot.items[0].status, ItemStatus::Skipped);
        assert!(fs::symlink_metadata(snapshot.dir.join("global_config.yml")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_same_second_snapshot_with_links_succeeds() {
        let project = tempfile::tempdir().unwrap();
        let root = project.path();
        fs::create_dir_all(root.join("data")).unwrap();
        fs::write(root.join("data/a.txt"), "x").unwrap();
        std::os::unix::fs::symlink("a.txt", root.join("data/latest")).unwrap();

        let manager = BackupManager::new(root.join("backups"));
        let sources = vec![root.join("data")];
        let first = manager.create_snapshot(&sources, at(0)).unwrap();
        let second = manager.create_snapshot(&sources, at(0)).unwrap();

        assert_eq!(first.dir, second.dir);
        let link = second.dir.join("data/latest");
        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("a.txt"));
        assert_eq!(fs::read_to_string(&link).unwrap(), "x");
    }

    #[test]
    fn test_snapshot_with_nothing_present_still_creates_dir() {
        let project = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(project.path().join("backups"));
        let snapshot = manager
            .create_snapshot(&[project.path().join("data")], at(0))
            .unwrap();
        assert!(snapshot.dir.is_dir());
        assert_eq!(fs::read_dir(&snapshot.dir).unwrap().count(), 0);
    }

    #[test]
    fn test_list_backups_newest_first_and_ignores_foreign_entries() {
        let project = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(project.path().join("backups"));
        assert!(manager.list_backups().unwrap().is_empty());

        for sec in [5, 1, 3] {
            manager.create_snapshot(&[], at(sec)).unwrap();
        }
        fs::create_dir_all(manager.backup_root().join("manual-copy")).unwrap();
        fs::write(manager.backup_root().join("backup_notes.txt"), "hi").unwrap();

        let names: Vec<_> = manager.list_backups().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec!["backup_20240501_120005", "backup_20240501_120003", "backup_20240501_120001"]
        );
    }

    #[test]
    fn test_prune_keeps_newest() {
        let project = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(project.path().join("backups"));
        for sec in 0..4 {
            manager.create_snapshot(&[], at(sec)).unwrap();
        }

        let planned = manager.prune(2, true).unwrap();
        assert_eq!(planned.len(), 2);
        assert_eq!(manager.list_backups().unwrap().len(), 4);

        let removed = manager.prune(2, false).unwrap();
        assert_eq!(removed, planned);
        let left: Vec<_> = manager.list_backups().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(left, vec!["backup_20240501_120003", "backup_20240501_120002"]);

        assert!(matches!(manager.prune(0, false), Err(BackupError::InvalidKeep)));
    }
}
