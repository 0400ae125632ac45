use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

/// Writes `contents` to `path` and to an immutable timestamped backup next
/// to it. Returns the backup path.
pub fn write_with_backup(path: &Path, contents: &str) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;

    let backup = backup_path(path, unix_now());
    fs::write(&backup, contents)
        .with_context(|| format!("Failed to write backup {}", backup.display()))?;

    Ok(backup)
}

/// Backup naming: `data/aUSDC.json` becomes `data/aUSDC.{timestamp}.json`.
pub fn backup_path(path: &Path, timestamp: u64) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("json");

    path.with_file_name(format!("{stem}.{timestamp}.{ext}"))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_path_inserts_timestamp_before_extension() {
        let path = Path::new("/data/holders/aUSDC.json");
        assert_eq!(
            backup_path(path, 1724680000),
            PathBuf::from("/data/holders/aUSDC.1724680000.json")
        );
    }

    #[test]
    fn write_with_backup_writes_identical_content_twice() {
        let dir = std::env::temp_dir().join(format!("persist_test_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("stats.json");

        let backup = write_with_backup(&path, "{\"ok\":true}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"ok\":true}");
        assert_eq!(fs::read_to_string(&backup).unwrap(), "{\"ok\":true}");
        assert_ne!(backup, path);
        assert!(backup
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("stats."));

        let _ = fs::remove_dir_all(&dir);
    }
}
