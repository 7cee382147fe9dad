use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, warn};

use super::error::BackupError;
use super::{BACKUP_FILE_EXTENSION, BACKUP_FILE_PREFIX};

/// `backup-<RFC 3339 millis with ':' and '.' replaced by '-'>.json`
pub fn backup_file_name(taken_at: DateTime<Utc>) -> String {
    let stamp = taken_at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{BACKUP_FILE_PREFIX}{stamp}{BACKUP_FILE_EXTENSION}")
}

/// Accepts only plain `*.json` names inside the backup directory.
pub fn validate_filename(filename: &str) -> Result<(), BackupError> {
    let invalid = filename.is_empty()
        || filename.starts_with('.')
        || filename.contains("..")
        || filename.contains(['/', '\\', '\0'])
        || !filename.ends_with(BACKUP_FILE_EXTENSION)
        || filename.len() == BACKUP_FILE_EXTENSION.len();

    if invalid {
        Err(BackupError::InvalidFilename(filename.to_string()))
    } else {
        Ok(())
    }
}

/// Splits `backup-<stamp>-<n>.json` into `("backup-<stamp>", n)`. A name
/// without a collision suffix counts as `n = 0`.
fn collision_key(name: &str) -> (&str, u32) {
    let stem = name.strip_suffix(BACKUP_FILE_EXTENSION).unwrap_or(name);
    // The stamp itself ends in `-<millis>Z`, never in bare digits.
    match stem.rsplit_once('-') {
        Some((base, suffix)) if suffix.bytes().all(|b| b.is_ascii_digit()) => {
            suffix.parse().map_or((stem, 0), |n| (base, n))
        }
        _ => (stem, 0),
    }
}

/// Backup file names, most recently modified first. Equal modification
/// times fall back to the stamp, then to the collision suffix, both newest
/// first, so `-10` outranks `-9` and `-1` outranks the bare name.
pub fn list_backup_files(dir: &Path) -> io::Result<Vec<String>> {
    let mut entries: Vec<(SystemTime, String)> = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') || !name.ends_with(BACKUP_FILE_EXTENSION) {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        entries.push((modified, name));
    }

    entries.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| collision_key(&b.1).cmp(&collision_key(&a.1)))
    });
    Ok(entries.into_iter().map(|(_, name)| name).collect())
}

/// Deletes every backup beyond the `keep` most recent ones. Each deletion is
/// independent; failures are logged and skipped. Returns how many files were
/// removed.
pub fn prune_backups(dir: &Path, keep: usize) -> io::Result<usize> {
    let backups = list_backup_files(dir)?;
    if backups.len() <= keep {
        return Ok(0);
    }

    let mut removed = 0usize;
    for name in backups[keep..].iter().rev() {
        match fs::remove_file(dir.join(name)) {
            Ok(()) => removed += 1,
            Err(err) => {
                warn!(category = "BACKUP", filename = %name, error = %err, "failed to delete old backup");
            }
        }
    }

    info!(category = "BACKUP", removed, kept = keep, "pruned old backups");
    Ok(removed)
}
