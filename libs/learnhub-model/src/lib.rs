//! LearnHub domain model.
//!
//! Entity types shared by the maintenance service and its tooling: accounts,
//! plans, course modules, lessons and quizzes, plus the on-disk backup
//! snapshot format. JSON field names are camelCase so snapshots written by
//! earlier deployments load unchanged.

use thiserror::Error;

pub mod entities;
pub mod quiz;
pub mod snapshot;

pub use entities::{Account, CourseModule, DifficultyLevel, Lesson, Plan, Quiz};
pub use quiz::{decode_options, encode_options, validate_quiz};
pub use snapshot::{BackupSnapshot, SnapshotCounts, SNAPSHOT_VERSION};

/// Errors raised while validating model data.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Quiz options are not a JSON array of strings
    #[error("invalid quiz options: {0}")]
    InvalidOptions(String),

    /// Correct answer does not index into the option list
    #[error("correct answer {index} out of range for {len} options")]
    AnswerOutOfRange { index: u32, len: usize },

    /// Unknown difficulty tier
    #[error("invalid difficulty level: {0}")]
    InvalidLevel(String),

    /// Snapshot written by an incompatible format version
    #[error("unsupported snapshot version {found} (supported: {supported})")]
    UnsupportedVersion { found: String, supported: String },

    /// A child row points at a parent missing from the snapshot
    #[error("{entity} {id} references missing {reference}")]
    DanglingReference {
        entity: &'static str,
        id: String,
        reference: String,
    },
}

/// Generates a fresh identifier for a new row.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
