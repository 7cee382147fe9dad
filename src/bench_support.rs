use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use learnhub_maintenance::storage::{NewAccount, NewLesson, NewModule, NewQuiz};
use learnhub_maintenance::{BackupService, LearnhubDatabase, MaintenanceConfig, QuotaManager};
use learnhub_model::entities::DEFAULT_AI_REQUESTS_LIMIT;
use learnhub_model::{BackupSnapshot, DifficultyLevel};
use tempfile::TempDir;
use tracing::debug;

pub use learnhub_maintenance;
pub use learnhub_model;
pub use serde_json;

/// Size of the catalog written by [`BackupBenchFixture::seeded`].
#[derive(Debug, Clone, Copy)]
pub struct CatalogShape {
    pub accounts: usize,
    pub modules: usize,
    pub lessons_per_module: usize,
    pub quizzes_per_lesson: usize,
}

impl CatalogShape {
    pub const SMALL: CatalogShape = CatalogShape {
        accounts: 20,
        modules: 3,
        lessons_per_module: 5,
        quizzes_per_lesson: 2,
    };

    pub const MEDIUM: CatalogShape = CatalogShape {
        accounts: 500,
        modules: 12,
        lessons_per_module: 10,
        quizzes_per_lesson: 4,
    };
}

/// A store on a temporary directory, populated with a synthetic catalog.
pub struct BackupBenchFixture {
    pub database: Arc<LearnhubDatabase>,
    pub backups: BackupService,
    pub quota: QuotaManager,
    pub account_ids: Vec<String>,
    pub temp_dir: TempDir,
}

impl BackupBenchFixture {
    pub fn seeded(shape: CatalogShape) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let config = MaintenanceConfig {
            data_dir: temp_dir.path().join("data"),
            backup_dir: temp_dir.path().join("backups"),
            max_backups: 3,
            ..Default::default()
        };
        config.validate()?;

        let database = Arc::new(LearnhubDatabase::new(config.data_dir.clone())?);
        let account_ids = seed_catalog(&database, shape, DEFAULT_AI_REQUESTS_LIMIT)?;
        let backups = BackupService::new(Arc::clone(&database), &config)?;
        let quota = QuotaManager::new(Arc::clone(&database));

        debug!(accounts = account_ids.len(), "seeded benchmark catalog");
        Ok(Self {
            database,
            backups,
            quota,
            account_ids,
            temp_dir,
        })
    }

    /// Serialized snapshot of the current store, as written to backup files.
    pub fn snapshot_json(&self) -> Result<String> {
        let snapshot: BackupSnapshot = self.database.export_snapshot(Utc::now())?;
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }
}

fn seed_catalog(
    database: &LearnhubDatabase,
    shape: CatalogShape,
    ai_limit: u32,
) -> Result<Vec<String>> {
    let mut account_ids = Vec::with_capacity(shape.accounts);
    for i in 0..shape.accounts {
        let account = database.create_account(
            NewAccount {
                name: format!("Aluno {i}"),
                email: format!("aluno{i}@bench.learnhub.dev"),
                password_hash: format!("hash-{i}"),
                ..Default::default()
            },
            ai_limit,
        )?;
        account_ids.push(account.id);
    }

    let levels = [
        DifficultyLevel::Basic,
        DifficultyLevel::Intermediate,
        DifficultyLevel::Advanced,
    ];
    for m in 0..shape.modules {
        let module = database.create_module(NewModule {
            title: format!("Módulo {m}"),
            description: format!("Descrição do módulo {m}"),
            level: levels[m % levels.len()],
            order: m as i32,
        })?;
        for l in 0..shape.lessons_per_module {
            let lesson = database.create_lesson(NewLesson {
                module_id: module.id.clone(),
                title: format!("Aula {m}.{l}"),
                content: "Lorem ipsum dolor sit amet. ".repeat(20),
                video_url: Some(format!("https://videos.learnhub.dev/{m}/{l}")),
                order: l as i32 + 1,
            })?;
            for q in 0..shape.quizzes_per_lesson {
                database.create_quiz(NewQuiz {
                    lesson_id: lesson.id.clone(),
                    question: format!("Pergunta {q} da aula {m}.{l}"),
                    options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                    correct_answer: (q % 4) as u32,
                    points: None,
                    order: q as i32,
                })?;
            }
        }
    }

    Ok(account_ids)
}
