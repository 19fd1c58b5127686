/// Helper utilities for the redeploy CLI

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::utils::{BACKUP_DIR_PREFIX, BACKUP_TIMESTAMP_FORMAT};

/// Resolve `path` against `root` unless it is already absolute
pub fn resolve_path<P: AsRef<Path>>(root: &Path, path: P) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Backup directory name for a given instant, e.g. `backup_20240131_235959`
pub fn backup_dir_name(at: DateTime<Local>) -> String {
    format!("{}{}", BACKUP_DIR_PREFIX, at.format(BACKUP_TIMESTAMP_FORMAT))
}

/// Parse the timestamp back out of a backup directory name
pub fn parse_backup_dir_name(name: &str) -> Option<chrono::NaiveDateTime> {
    let stamp = name.strip_prefix(BACKUP_DIR_PREFIX)?;
    chrono::NaiveDateTime::parse_from_str(stamp, BACKUP_TIMESTAMP_FORMAT).ok()
}

/// Last `n` lines of `text`, joined with newlines
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Total size in bytes of all regular files below `path`
pub fn dir_size<P: AsRef<Path>>(path: P) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.metadata().ok())
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
        .sum()
}

/// Format bytes to human-readable size
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Check if a directory exists and is writable
pub fn is_dir_writable<P: AsRef<Path>>(path: P) -> bool {
    if let Ok(metadata) = std::fs::metadata(&path) {
        metadata.is_dir() && !metadata.permissions().readonly()
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_backup_dir_name_round_trips_and_sorts() {
        let earlier = Local.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
        let later = Local.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        let a = backup_dir_name(earlier);
        let b = backup_dir_name(later);
        assert_eq!(a, "backup_20240131_235959");
        assert!(a < b);
        assert_eq!(parse_backup_dir_name(&a), Some(earlier.naive_local()));
        assert_eq!(parse_backup_dir_name("notes.txt"), None);
    }

    #[test]
    fn test_tail_lines() {
        let text = (1..=30).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let tail = tail_lines(&text, 20);
        assert_eq!(tail.lines().count(), 20);
        assert!(tail.starts_with("line 11"));
        assert_eq!(tail_lines("a\nb", 20), "a\nb");
    }

    #[test]
    fn test_resolve_path() {
        let root = Path::new("/srv/app");
        assert_eq!(resolve_path(root, "data"), PathBuf::from("/srv/app/data"));
        assert_eq!(resolve_path(root, "/abs/data"), PathBuf::from("/abs/data"));
    }

    #[test]
    fn test_dir_size() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"12345").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b"), b"123").unwrap();
        assert_eq!(dir_size(dir.path()), 8);
    }
}
