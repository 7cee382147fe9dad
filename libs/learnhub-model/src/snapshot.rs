use std::collections::{HashMap, HashSet};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{Account, CourseModule, Lesson, Quiz};
use crate::{new_id, ModelError};

/// Format tag written into every snapshot.
pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// Point-in-time copy of the four backed-up collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub users: Vec<Account>,
    pub modules: Vec<CourseModule>,
    pub lessons: Vec<Lesson>,
    pub quizzes: Vec<Quiz>,
    pub timestamp: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCounts {
    pub users: usize,
    pub modules: usize,
    pub lessons: usize,
    pub quizzes: usize,
}

impl SnapshotCounts {
    pub fn total(&self) -> usize {
        self.users + self.modules + self.lessons + self.quizzes
    }
}

impl BackupSnapshot {
    pub fn new(
        users: Vec<Account>,
        modules: Vec<CourseModule>,
        lessons: Vec<Lesson>,
        quizzes: Vec<Quiz>,
        taken_at: DateTime<Utc>,
    ) -> Self {
        Self {
            users,
            modules,
            lessons,
            quizzes,
            timestamp: taken_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            version: SNAPSHOT_VERSION.to_string(),
        }
    }

    pub fn counts(&self) -> SnapshotCounts {
        SnapshotCounts {
            users: self.users.len(),
            modules: self.modules.len(),
            lessons: self.lessons.len(),
            quizzes: self.quizzes.len(),
        }
    }

    /// Rejects snapshots whose major version differs from [`SNAPSHOT_VERSION`].
    pub fn check_version(&self) -> Result<(), ModelError> {
        if major(&self.version) == major(SNAPSHOT_VERSION) && !self.version.trim().is_empty() {
            Ok(())
        } else {
            Err(ModelError::UnsupportedVersion {
                found: self.version.clone(),
                supported: SNAPSHOT_VERSION.to_string(),
            })
        }
    }

    /// Every lesson must point at a module in the snapshot and every quiz at a
    /// lesson in the snapshot. Reports the first dangling reference.
    pub fn validate_references(&self) -> Result<(), ModelError> {
        let module_ids: HashSet<&str> = self.modules.iter().map(|m| m.id.as_str()).collect();
        for lesson in &self.lessons {
            if !module_ids.contains(lesson.module_id.as_str()) {
                return Err(ModelError::DanglingReference {
                    entity: "lesson",
                    id: lesson.id.clone(),
                    reference: format!("module {}", lesson.module_id),
                });
            }
        }

        let lesson_ids: HashSet<&str> = self.lessons.iter().map(|l| l.id.as_str()).collect();
        for quiz in &self.quizzes {
            if !lesson_ids.contains(quiz.lesson_id.as_str()) {
                return Err(ModelError::DanglingReference {
                    entity: "quiz",
                    id: quiz.id.clone(),
                    reference: format!("lesson {}", quiz.lesson_id),
                });
            }
        }

        Ok(())
    }

    /// Assigns fresh identifiers to every row and rewrites `moduleId` and
    /// `lessonId` so the module/lesson/quiz graph stays connected.
    pub fn with_fresh_ids(mut self) -> Self {
        for user in &mut self.users {
            user.id = new_id();
        }

        let mut module_ids = HashMap::with_capacity(self.modules.len());
        for module in &mut self.modules {
            let fresh = new_id();
            module_ids.insert(std::mem::replace(&mut module.id, fresh.clone()), fresh);
        }

        let mut lesson_ids = HashMap::with_capacity(self.lessons.len());
        for lesson in &mut self.lessons {
            let fresh = new_id();
            lesson_ids.insert(std::mem::replace(&mut lesson.id, fresh.clone()), fresh);
            if let Some(module_id) = module_ids.get(&lesson.module_id) {
                lesson.module_id = module_id.clone();
            }
        }

        for quiz in &mut self.quizzes {
            quiz.id = new_id();
            if let Some(lesson_id) = lesson_ids.get(&quiz.lesson_id) {
                quiz.lesson_id = lesson_id.clone();
            }
        }

        self
    }
}

fn major(version: &str) -> &str {
    version.trim().split('.').next().unwrap_or_default()
}
