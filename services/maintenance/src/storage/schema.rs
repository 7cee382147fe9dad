use rusqlite::Connection;

use super::error::StorageError;

pub const PLANS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS plans (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL,
    price INTEGER NOT NULL DEFAULT 0,
    ai_requests_limit INTEGER NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

pub const ACCOUNTS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    points INTEGER NOT NULL DEFAULT 0,
    level INTEGER NOT NULL DEFAULT 1,
    is_admin INTEGER NOT NULL DEFAULT 0,
    plan_id TEXT REFERENCES plans(id) ON DELETE SET NULL,
    ai_requests_limit INTEGER NOT NULL,
    ai_requests_used INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

pub const MODULES_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS modules (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    level TEXT NOT NULL,
    sort_order INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    course_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

pub const LESSONS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS lessons (
    id TEXT PRIMARY KEY,
    module_id TEXT NOT NULL REFERENCES modules(id),
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    video_url TEXT,
    image_url TEXT,
    code_example TEXT,
    sort_order INTEGER NOT NULL DEFAULT 1,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

pub const QUIZZES_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS quizzes (
    id TEXT PRIMARY KEY,
    lesson_id TEXT NOT NULL REFERENCES lessons(id),
    question TEXT NOT NULL,
    options TEXT NOT NULL,
    correct_answer INTEGER NOT NULL,
    points INTEGER NOT NULL DEFAULT 10,
    sort_order INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

// Usage history is keyed by account id without a foreign key so it outlives
// account rows replaced by a restore.
pub const AI_USAGE_LOGS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ai_usage_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id TEXT NOT NULL,
    message TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

pub const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_lessons_module ON lessons(module_id, sort_order);
CREATE INDEX IF NOT EXISTS idx_quizzes_lesson ON quizzes(lesson_id, sort_order);
CREATE INDEX IF NOT EXISTS idx_usage_account_created ON ai_usage_logs(account_id, created_at);
"#;

pub fn init_database(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(PLANS_TABLE_SCHEMA)?;
    conn.execute_batch(ACCOUNTS_TABLE_SCHEMA)?;
    conn.execute_batch(MODULES_TABLE_SCHEMA)?;
    conn.execute_batch(LESSONS_TABLE_SCHEMA)?;
    conn.execute_batch(QUIZZES_TABLE_SCHEMA)?;
    conn.execute_batch(AI_USAGE_LOGS_TABLE_SCHEMA)?;
    conn.execute_batch(INDEXES)?;
    Ok(())
}
