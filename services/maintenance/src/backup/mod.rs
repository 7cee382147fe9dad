pub mod error;
pub mod retention;
pub mod service;

use std::fmt;
use std::str::FromStr;

use learnhub_model::SnapshotCounts;
use serde::{Deserialize, Serialize};

pub use error::BackupError;
pub use service::BackupService;

pub const BACKUP_FILE_PREFIX: &str = "backup-";
pub const BACKUP_FILE_EXTENSION: &str = ".json";

/// How identifiers are treated when a snapshot is loaded back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreIdPolicy {
    /// Keep the snapshot's identifiers; references held elsewhere stay valid.
    #[default]
    Preserve,
    /// Assign fresh identifiers, rewriting module and lesson references.
    Regenerate,
}

impl fmt::Display for RestoreIdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreIdPolicy::Preserve => f.write_str("preserve"),
            RestoreIdPolicy::Regenerate => f.write_str("regenerate"),
        }
    }
}

impl FromStr for RestoreIdPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve" => Ok(RestoreIdPolicy::Preserve),
            "regenerate" => Ok(RestoreIdPolicy::Regenerate),
            other => Err(format!("unknown restore id policy: {other}")),
        }
    }
}

/// Metadata reported for one backup file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub filename: String,
    pub timestamp: String,
    pub version: String,
    pub size: u64,
    pub users: usize,
    pub modules: usize,
    pub lessons: usize,
    pub quizzes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreSummary {
    pub filename: String,
    pub restored: SnapshotCounts,
    pub id_policy: RestoreIdPolicy,
}
