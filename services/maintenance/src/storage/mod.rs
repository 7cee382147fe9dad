pub mod database;
pub mod error;
pub mod schema;

pub use database::{
    AiUsageLog, ConsumeOutcome, LearnhubDatabase, NewAccount, NewLesson, NewModule, NewPlan,
    NewQuiz, UsageLogFilter,
};
pub use error::StorageError;

pub const LEARNHUB_DB_FILENAME: &str = "learnhub.db";

pub const USAGE_STATUS_SUCCESS: &str = "success";
pub const USAGE_STATUS_LIMIT: &str = "limit";
