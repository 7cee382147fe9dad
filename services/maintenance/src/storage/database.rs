use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use learnhub_model::{
    encode_options, new_id, validate_quiz, Account, BackupSnapshot, CourseModule,
    DifficultyLevel, Lesson, Plan, Quiz, SnapshotCounts,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::StorageError;
use super::schema::init_database;
use super::{LEARNHUB_DB_FILENAME, USAGE_STATUS_LIMIT, USAGE_STATUS_SUCCESS};

const PLAN_COLUMNS: &str =
    "id, name, description, price, ai_requests_limit, is_active, created_at, updated_at";
const ACCOUNT_COLUMNS: &str = "id, name, email, password_hash, points, level, is_admin, plan_id, ai_requests_limit, ai_requests_used, created_at, updated_at";
const MODULE_COLUMNS: &str =
    "id, title, description, level, sort_order, is_active, course_id, created_at, updated_at";
const LESSON_COLUMNS: &str = "id, module_id, title, content, video_url, image_url, code_example, sort_order, is_active, created_at, updated_at";
const QUIZ_COLUMNS: &str = "id, lesson_id, question, options, correct_answer, points, sort_order, is_active, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewPlan {
    pub name: String,
    pub description: String,
    pub price: i64,
    pub ai_requests_limit: u32,
}

#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub plan_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewModule {
    pub title: String,
    pub description: String,
    pub level: DifficultyLevel,
    pub order: i32,
}

#[derive(Debug, Clone, Default)]
pub struct NewLesson {
    pub module_id: String,
    pub title: String,
    pub content: String,
    pub video_url: Option<String>,
    pub order: i32,
}

#[derive(Debug, Clone, Default)]
pub struct NewQuiz {
    pub lesson_id: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: u32,
    pub points: Option<u32>,
    pub order: i32,
}

/// Result of gating one AI request against an account's allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Granted { used: u32, limit: u32 },
    LimitReached { used: u32, limit: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiUsageLog {
    pub id: i64,
    #[serde(rename = "userId")]
    pub account_id: String,
    pub message: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UsageLogFilter {
    pub account_id: Option<String>,
    pub status: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: usize,
    pub skip: usize,
}

impl Default for UsageLogFilter {
    fn default() -> Self {
        Self {
            account_id: None,
            status: None,
            from: None,
            to: None,
            limit: 50,
            skip: 0,
        }
    }
}

/// SQLite-backed store for accounts, plans and the course catalog.
pub struct LearnhubDatabase {
    conn: Mutex<Connection>,
}

impl LearnhubDatabase {
    pub fn new(data_dir: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&data_dir)?;
        let db_path = data_dir.join(LEARNHUB_DB_FILENAME);
        let is_new = !db_path.exists();
        let conn = Connection::open(&db_path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        init_database(&conn)?;

        if is_new {
            info!(path = %db_path.display(), "initialized learnhub database");
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    pub fn ping(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    pub fn create_plan(&self, plan: NewPlan) -> Result<Plan, StorageError> {
        if plan.name.trim().is_empty() || plan.description.trim().is_empty() {
            return Err(StorageError::InvalidValue(
                "plan name and description are required".into(),
            ));
        }

        let conn = self.conn()?;
        let exists = conn
            .query_row("SELECT 1 FROM plans WHERE name = ?1", params![plan.name], |_| Ok(()))
            .optional()?
            .is_some();
        if exists {
            return Err(StorageError::Conflict(format!("plan {} already exists", plan.name)));
        }

        let now = Utc::now();
        let record = Plan {
            id: new_id(),
            name: plan.name,
            description: plan.description,
            price: plan.price,
            ai_requests_limit: plan.ai_requests_limit,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            &format!("INSERT INTO plans ({PLAN_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                record.id,
                record.name,
                record.description,
                record.price,
                record.ai_requests_limit,
                record.is_active,
                record.created_at,
                record.updated_at,
            ],
        )?;

        Ok(record)
    }

    /// Creates an account. The AI allowance is copied from the plan when one
    /// is given, otherwise `default_ai_limit` applies.
    pub fn create_account(
        &self,
        account: NewAccount,
        default_ai_limit: u32,
    ) -> Result<Account, StorageError> {
        if account.name.trim().is_empty() || account.email.trim().is_empty() {
            return Err(StorageError::InvalidValue("name and email are required".into()));
        }

        let conn = self.conn()?;
        let taken = conn
            .query_row(
                "SELECT 1 FROM accounts WHERE email = ?1",
                params![account.email],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if taken {
            return Err(StorageError::Conflict(format!(
                "email {} already registered",
                account.email
            )));
        }

        let ai_requests_limit = match &account.plan_id {
            Some(plan_id) => conn
                .query_row(
                    "SELECT ai_requests_limit FROM plans WHERE id = ?1",
                    params![plan_id],
                    |row| row.get::<_, u32>(0),
                )
                .optional()?
                .ok_or_else(|| StorageError::NotFound(format!("plan {plan_id}")))?,
            None => default_ai_limit,
        };

        let now = Utc::now();
        let record = Account {
            id: new_id(),
            name: account.name,
            email: account.email,
            password_hash: account.password_hash,
            points: 0,
            level: 1,
            is_admin: account.is_admin,
            plan_id: account.plan_id,
            ai_requests_limit,
            ai_requests_used: 0,
            created_at: now,
            updated_at: now,
        };
        insert_account(&conn, &record)?;

        debug!(account_id = %record.id, "created account");
        Ok(record)
    }

    pub fn get_account(&self, account_id: &str) -> Result<Option<Account>, StorageError> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
                params![account_id],
                map_account,
            )
            .optional()?;
        Ok(account)
    }

    pub fn list_accounts(&self) -> Result<Vec<Account>, StorageError> {
        let conn = self.conn()?;
        select_all(
            &conn,
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY created_at, id"),
            map_account,
        )
    }

    pub fn create_module(&self, module: NewModule) -> Result<CourseModule, StorageError> {
        let now = Utc::now();
        let record = CourseModule {
            id: new_id(),
            title: module.title,
            description: module.description,
            level: module.level,
            order: module.order,
            is_active: true,
            course_id: None,
            created_at: now,
            updated_at: now,
        };

        let conn = self.conn()?;
        insert_module(&conn, &record)?;
        Ok(record)
    }

    pub fn create_lesson(&self, lesson: NewLesson) -> Result<Lesson, StorageError> {
        let conn = self.conn()?;
        let module_exists = conn
            .query_row(
                "SELECT 1 FROM modules WHERE id = ?1",
                params![lesson.module_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !module_exists {
            return Err(StorageError::NotFound(format!("module {}", lesson.module_id)));
        }

        let now = Utc::now();
        let record = Lesson {
            id: new_id(),
            module_id: lesson.module_id,
            title: lesson.title,
            content: lesson.content,
            video_url: lesson.video_url,
            image_url: None,
            code_example: None,
            order: lesson.order,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        insert_lesson(&conn, &record)?;
        Ok(record)
    }

    pub fn create_quiz(&self, quiz: NewQuiz) -> Result<Quiz, StorageError> {
        let now = Utc::now();
        let record = Quiz {
            id: new_id(),
            lesson_id: quiz.lesson_id,
            question: quiz.question,
            options: encode_options(&quiz.options),
            correct_answer: quiz.correct_answer,
            points: quiz.points.unwrap_or(learnhub_model::entities::DEFAULT_QUIZ_POINTS),
            order: quiz.order,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        validate_quiz(&record)?;

        let conn = self.conn()?;
        let lesson_exists = conn
            .query_row(
                "SELECT 1 FROM lessons WHERE id = ?1",
                params![record.lesson_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !lesson_exists {
            return Err(StorageError::NotFound(format!("lesson {}", record.lesson_id)));
        }

        insert_quiz(&conn, &record)?;
        Ok(record)
    }

    pub fn entity_counts(&self) -> Result<SnapshotCounts, StorageError> {
        let conn = self.conn()?;
        Ok(SnapshotCounts {
            users: count_rows(&conn, "accounts")?,
            modules: count_rows(&conn, "modules")?,
            lessons: count_rows(&conn, "lessons")?,
            quizzes: count_rows(&conn, "quizzes")?,
        })
    }

    /// Reads the four backed-up collections inside one transaction so the
    /// snapshot is a consistent point-in-time copy.
    pub fn export_snapshot(&self, taken_at: DateTime<Utc>) -> Result<BackupSnapshot, StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let users = select_all(
            &tx,
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY created_at, id"),
            map_account,
        )?;
        let modules = select_all(
            &tx,
            &format!("SELECT {MODULE_COLUMNS} FROM modules ORDER BY sort_order, id"),
            map_module,
        )?;
        let lessons = select_all(
            &tx,
            &format!("SELECT {LESSON_COLUMNS} FROM lessons ORDER BY module_id, sort_order, id"),
            map_lesson,
        )?;
        let quizzes = select_all(
            &tx,
            &format!("SELECT {QUIZ_COLUMNS} FROM quizzes ORDER BY lesson_id, sort_order, id"),
            map_quiz,
        )?;

        tx.commit()?;
        Ok(BackupSnapshot::new(users, modules, lessons, quizzes, taken_at))
    }

    /// Replaces accounts, modules, lessons and quizzes with the snapshot's rows.
    ///
    /// Deletes run child before parent and inserts parent before child, all in
    /// a single transaction: any failure leaves the store untouched. Accounts
    /// pointing at a plan that no longer exists are restored without a plan.
    pub fn replace_with_snapshot(
        &self,
        snapshot: &BackupSnapshot,
    ) -> Result<SnapshotCounts, StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM quizzes", [])?;
        tx.execute("DELETE FROM lessons", [])?;
        tx.execute("DELETE FROM modules", [])?;
        tx.execute("DELETE FROM accounts", [])?;

        let plan_ids: HashSet<String> = select_all(&tx, "SELECT id FROM plans", |row| row.get::<_, String>(0))?
            .into_iter()
            .collect();

        for user in &snapshot.users {
            match &user.plan_id {
                Some(plan_id) if !plan_ids.contains(plan_id) => {
                    warn!(
                        account_id = %user.id,
                        plan_id = %plan_id,
                        "restored account references unknown plan; clearing plan"
                    );
                    let mut detached = user.clone();
                    detached.plan_id = None;
                    insert_account(&tx, &detached)?;
                }
                _ => insert_account(&tx, user)?,
            }
        }
        for module in &snapshot.modules {
            insert_module(&tx, module)?;
        }
        for lesson in &snapshot.lessons {
            insert_lesson(&tx, lesson)?;
        }
        for quiz in &snapshot.quizzes {
            insert_quiz(&tx, quiz)?;
        }

        tx.commit()?;
        Ok(snapshot.counts())
    }

    /// Sets every account's AI usage counter to zero in one statement.
    pub fn reset_all_ai_usage(&self) -> Result<usize, StorageError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE accounts SET ai_requests_used = 0, updated_at = ?1",
            params![Utc::now()],
        )?;
        Ok(updated)
    }

    /// Checks the account's allowance and, when there is room, increments the
    /// usage counter. Both outcomes are recorded in the usage log.
    pub fn consume_ai_request(
        &self,
        account_id: &str,
        message: &str,
    ) -> Result<ConsumeOutcome, StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let (used, limit) = tx
            .query_row(
                "SELECT ai_requests_used, ai_requests_limit FROM accounts WHERE id = ?1",
                params![account_id],
                |row| Ok((row.get::<_, u32>(0)?, row.get::<_, u32>(1)?)),
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("account {account_id}")))?;

        let now = Utc::now();
        let outcome = if used >= limit {
            ConsumeOutcome::LimitReached { used, limit }
        } else {
            tx.execute(
                "UPDATE accounts SET ai_requests_used = ai_requests_used + 1, updated_at = ?2 WHERE id = ?1",
                params![account_id, now],
            )?;
            ConsumeOutcome::Granted {
                used: used + 1,
                limit,
            }
        };

        let status = match outcome {
            ConsumeOutcome::Granted { .. } => USAGE_STATUS_SUCCESS,
            ConsumeOutcome::LimitReached { .. } => USAGE_STATUS_LIMIT,
        };
        insert_usage_log(&tx, account_id, message, status, now)?;

        tx.commit()?;
        Ok(outcome)
    }

    /// Returns one page of usage logs, newest first, and the total number of
    /// rows matching the filter.
    pub fn query_ai_usage(
        &self,
        filter: &UsageLogFilter,
    ) -> Result<(Vec<AiUsageLog>, usize), StorageError> {
        let conn = self.conn()?;

        let mut conditions = vec!["1 = 1"];
        let mut bindings: Vec<(&str, &dyn ToSql)> = Vec::new();

        if let Some(account_id) = &filter.account_id {
            conditions.push("account_id = :account_id");
            bindings.push((":account_id", account_id));
        }
        if let Some(status) = &filter.status {
            conditions.push("status = :status");
            bindings.push((":status", status));
        }
        if let Some(from) = &filter.from {
            conditions.push("created_at >= :from");
            bindings.push((":from", from));
        }
        if let Some(to) = &filter.to {
            conditions.push("created_at <= :to");
            bindings.push((":to", to));
        }
        let where_clause = conditions.join(" AND ");

        let total = conn.query_row(
            &format!("SELECT COUNT(*) FROM ai_usage_logs WHERE {where_clause}"),
            bindings.as_slice(),
            |row| row.get::<_, i64>(0),
        )?;

        let limit = filter.limit as i64;
        let skip = filter.skip as i64;
        let mut page = bindings.clone();
        page.push((":limit", &limit));
        page.push((":skip", &skip));

        let mut stmt = conn.prepare(&format!(
            "SELECT id, account_id, message, status, created_at FROM ai_usage_logs WHERE {where_clause} ORDER BY created_at DESC, id DESC LIMIT :limit OFFSET :skip"
        ))?;
        let rows = stmt.query_map(page.as_slice(), |row| {
            Ok(AiUsageLog {
                id: row.get(0)?,
                account_id: row.get(1)?,
                message: row.get(2)?,
                status: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;

        let mut logs = Vec::new();
        for row in rows {
            logs.push(row?);
        }
        Ok((logs, total.max(0) as usize))
    }
}

fn select_all<T>(
    conn: &Connection,
    sql: &str,
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, StorageError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], map)?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

fn count_rows(conn: &Connection, table: &str) -> Result<usize, StorageError> {
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(count.max(0) as usize)
}

fn insert_usage_log(
    conn: &Connection,
    account_id: &str,
    message: &str,
    status: &str,
    created_at: DateTime<Utc>,
) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO ai_usage_logs (account_id, message, status, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![account_id, message, status, created_at],
    )?;
    Ok(())
}

fn insert_account(conn: &Connection, account: &Account) -> Result<(), StorageError> {
    conn.execute(
        &format!(
            "INSERT INTO accounts ({ACCOUNT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            account.id,
            account.name,
            account.email,
            account.password_hash,
            account.points,
            account.level,
            account.is_admin,
            account.plan_id,
            account.ai_requests_limit,
            account.ai_requests_used,
            account.created_at,
            account.updated_at,
        ],
    )?;
    Ok(())
}

fn insert_module(conn: &Connection, module: &CourseModule) -> Result<(), StorageError> {
    conn.execute(
        &format!(
            "INSERT INTO modules ({MODULE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            module.id,
            module.title,
            module.description,
            module.level.as_str(),
            module.order,
            module.is_active,
            module.course_id,
            module.created_at,
            module.updated_at,
        ],
    )?;
    Ok(())
}

fn insert_lesson(conn: &Connection, lesson: &Lesson) -> Result<(), StorageError> {
    conn.execute(
        &format!(
            "INSERT INTO lessons ({LESSON_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            lesson.id,
            lesson.module_id,
            lesson.title,
            lesson.content,
            lesson.video_url,
            lesson.image_url,
            lesson.code_example,
            lesson.order,
            lesson.is_active,
            lesson.created_at,
            lesson.updated_at,
        ],
    )?;
    Ok(())
}

fn insert_quiz(conn: &Connection, quiz: &Quiz) -> Result<(), StorageError> {
    conn.execute(
        &format!(
            "INSERT INTO quizzes ({QUIZ_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        params![
            quiz.id,
            quiz.lesson_id,
            quiz.question,
            quiz.options,
            quiz.correct_answer,
            quiz.points,
            quiz.order,
            quiz.is_active,
            quiz.created_at,
            quiz.updated_at,
        ],
    )?;
    Ok(())
}

fn map_account(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        points: row.get(4)?,
        level: row.get(5)?,
        is_admin: row.get(6)?,
        plan_id: row.get(7)?,
        ai_requests_limit: row.get(8)?,
        ai_requests_used: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn map_module(row: &Row<'_>) -> rusqlite::Result<CourseModule> {
    let level: String = row.get(3)?;
    let level = level
        .parse::<DifficultyLevel>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(err)))?;

    Ok(CourseModule {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        level,
        order: row.get(4)?,
        is_active: row.get(5)?,
        course_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn map_lesson(row: &Row<'_>) -> rusqlite::Result<Lesson> {
    Ok(Lesson {
        id: row.get(0)?,
        module_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        video_url: row.get(4)?,
        image_url: row.get(5)?,
        code_example: row.get(6)?,
        order: row.get(7)?,
        is_active: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn map_quiz(row: &Row<'_>) -> rusqlite::Result<Quiz> {
    Ok(Quiz {
        id: row.get(0)?,
        lesson_id: row.get(1)?,
        question: row.get(2)?,
        options: row.get(3)?,
        correct_answer: row.get(4)?,
        points: row.get(5)?,
        order: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}
