use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use learnhub_model::BackupSnapshot;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::MaintenanceConfig;
use crate::storage::LearnhubDatabase;

use super::error::BackupError;
use super::retention::{backup_file_name, list_backup_files, prune_backups, validate_filename};
use super::{BackupInfo, RestoreIdPolicy, RestoreSummary, BACKUP_FILE_EXTENSION};

/// Writes, inspects, restores and prunes JSON snapshots of the store.
#[derive(Clone)]
pub struct BackupService {
    database: Arc<LearnhubDatabase>,
    backup_dir: PathBuf,
    max_backups: usize,
    id_policy: RestoreIdPolicy,
    clock: Arc<dyn Clock>,
}

impl BackupService {
    pub fn new(
        database: Arc<LearnhubDatabase>,
        config: &MaintenanceConfig,
    ) -> Result<Self, BackupError> {
        fs::create_dir_all(&config.backup_dir)?;
        Ok(Self {
            database,
            backup_dir: config.backup_dir.clone(),
            max_backups: config.max_backups.max(1),
            id_policy: config.restore_id_policy,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Snapshots the store to a new file and prunes old backups. Returns the
    /// new file's name.
    pub fn create_backup(&self) -> Result<String, BackupError> {
        let taken_at = self.clock.now();
        let snapshot = self.database.export_snapshot(taken_at)?;
        let counts = snapshot.counts();

        let filename = self.unused_file_name(&backup_file_name(taken_at));
        let payload = serde_json::to_vec_pretty(&snapshot)?;

        let tmp_path = self.backup_dir.join(format!(".{filename}.tmp"));
        fs::write(&tmp_path, payload)?;
        if let Err(err) = fs::rename(&tmp_path, self.backup_dir.join(&filename)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }

        info!(
            category = "BACKUP",
            filename = %filename,
            users = counts.users,
            modules = counts.modules,
            lessons = counts.lessons,
            quizzes = counts.quizzes,
            "backup created"
        );

        if let Err(err) = prune_backups(&self.backup_dir, self.max_backups) {
            warn!(category = "BACKUP", error = %err, "failed to prune old backups");
        }

        Ok(filename)
    }

    /// Replaces the four collections with the contents of `filename` in one
    /// transaction.
    pub fn restore_backup(&self, filename: &str) -> Result<RestoreSummary, BackupError> {
        let snapshot = self.read_snapshot(filename)?;
        snapshot.check_version()?;
        snapshot.validate_references()?;

        let snapshot = match self.id_policy {
            RestoreIdPolicy::Preserve => snapshot,
            RestoreIdPolicy::Regenerate => {
                warn!(
                    category = "BACKUP",
                    filename,
                    "restoring with regenerated identifiers; references held outside the backup will no longer resolve"
                );
                snapshot.with_fresh_ids()
            }
        };

        info!(category = "BACKUP", filename, id_policy = %self.id_policy, "restoring backup");
        let restored = self.database.replace_with_snapshot(&snapshot)?;

        info!(
            category = "BACKUP",
            filename,
            users = restored.users,
            modules = restored.modules,
            lessons = restored.lessons,
            quizzes = restored.quizzes,
            "backup restored"
        );

        Ok(RestoreSummary {
            filename: filename.to_string(),
            restored,
            id_policy: self.id_policy,
        })
    }

    /// Backup file names, most recently modified first.
    pub fn list_backups(&self) -> Result<Vec<String>, BackupError> {
        Ok(list_backup_files(&self.backup_dir)?)
    }

    pub fn backup_info(&self, filename: &str) -> Result<BackupInfo, BackupError> {
        let path = self.existing_path(filename)?;
        let size = fs::metadata(&path)?.len();
        let snapshot = self.read_snapshot(filename)?;
        let counts = snapshot.counts();

        Ok(BackupInfo {
            filename: filename.to_string(),
            timestamp: snapshot.timestamp,
            version: snapshot.version,
            size,
            users: counts.users,
            modules: counts.modules,
            lessons: counts.lessons,
            quizzes: counts.quizzes,
        })
    }

    pub fn delete_backup(&self, filename: &str) -> Result<(), BackupError> {
        let path = self.existing_path(filename)?;
        fs::remove_file(path)?;
        info!(category = "BACKUP", filename, "backup deleted");
        Ok(())
    }

    fn existing_path(&self, filename: &str) -> Result<PathBuf, BackupError> {
        validate_filename(filename)?;
        let path = self.backup_dir.join(filename);
        if !path.is_file() {
            return Err(BackupError::NotFound(filename.to_string()));
        }
        Ok(path)
    }

    fn read_snapshot(&self, filename: &str) -> Result<BackupSnapshot, BackupError> {
        let path = self.existing_path(filename)?;
        let raw = fs::read_to_string(&path)?;
        let snapshot = serde_json::from_str(&raw).map_err(|source| BackupError::Malformed {
            filename: filename.to_string(),
            source,
        })?;
        debug!(category = "BACKUP", filename, "parsed backup snapshot");
        Ok(snapshot)
    }

    fn unused_file_name(&self, candidate: &str) -> String {
        if !self.backup_dir.join(candidate).exists() {
            return candidate.to_string();
        }

        let stem = candidate.trim_end_matches(BACKUP_FILE_EXTENSION);
        let mut suffix = 1u32;
        loop {
            let name = format!("{stem}-{suffix}{BACKUP_FILE_EXTENSION}");
            if !self.backup_dir.join(&name).exists() {
                return name;
            }
            suffix += 1;
        }
    }
}
