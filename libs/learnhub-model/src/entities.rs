use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ModelError;

pub const DEFAULT_AI_REQUESTS_LIMIT: u32 = 10;
pub const DEFAULT_QUIZ_POINTS: u32 = 10;

/// Subscription plan. Plans carry the AI request allowance copied onto
/// accounts when they subscribe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Price in cents.
    #[serde(default)]
    pub price: i64,
    #[serde(default = "default_ai_requests_limit")]
    pub ai_requests_limit: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "password", default)]
    pub password_hash: String,
    #[serde(default)]
    pub points: i64,
    #[serde(default = "default_level")]
    pub level: i32,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default = "default_ai_requests_limit")]
    pub ai_requests_limit: u32,
    #[serde(default)]
    pub ai_requests_used: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn remaining_ai_requests(&self) -> u32 {
        self.ai_requests_limit.saturating_sub(self.ai_requests_used)
    }

    pub fn is_ai_quota_exhausted(&self) -> bool {
        self.ai_requests_used >= self.ai_requests_limit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DifficultyLevel {
    #[default]
    Basic,
    Intermediate,
    Advanced,
}

impl DifficultyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyLevel::Basic => "BASIC",
            DifficultyLevel::Intermediate => "INTERMEDIATE",
            DifficultyLevel::Advanced => "ADVANCED",
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DifficultyLevel {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BASIC" => Ok(DifficultyLevel::Basic),
            "INTERMEDIATE" => Ok(DifficultyLevel::Intermediate),
            "ADVANCED" => Ok(DifficultyLevel::Advanced),
            other => Err(ModelError::InvalidLevel(other.to_string())),
        }
    }
}

/// Ordered container of lessons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseModule {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub level: DifficultyLevel,
    #[serde(default)]
    pub order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub course_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub module_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub code_example: Option<String>,
    #[serde(default = "default_order")]
    pub order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub lesson_id: String,
    pub question: String,
    /// JSON array text, see [`crate::quiz::decode_options`].
    pub options: String,
    pub correct_answer: u32,
    #[serde(default = "default_quiz_points")]
    pub points: u32,
    #[serde(default)]
    pub order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

fn default_level() -> i32 {
    1
}

fn default_order() -> i32 {
    1
}

fn default_ai_requests_limit() -> u32 {
    DEFAULT_AI_REQUESTS_LIMIT
}

fn default_quiz_points() -> u32 {
    DEFAULT_QUIZ_POINTS
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn account_deserializes_camel_case_with_defaults() {
        let value = json!({
            "id": "acc-1",
            "name": "Ana",
            "email": "ana@example.com",
            "password": "$2b$hash",
            "aiRequestsUsed": 4,
            "createdAt": "2024-03-01T10:00:00.000Z",
            "updatedAt": "2024-03-01T10:00:00.000Z"
        });

        let account: Account = serde_json::from_value(value).expect("account should parse");
        assert_eq!(account.password_hash, "$2b$hash");
        assert_eq!(account.ai_requests_limit, DEFAULT_AI_REQUESTS_LIMIT);
        assert_eq!(account.ai_requests_used, 4);
        assert_eq!(account.level, 1);
        assert_eq!(account.remaining_ai_requests(), 6);
        assert!(!account.is_ai_quota_exhausted());
    }

    #[test]
    fn difficulty_level_parses_case_insensitively() {
        assert_eq!(
            "intermediate".parse::<DifficultyLevel>().unwrap(),
            DifficultyLevel::Intermediate
        );
        assert_eq!(DifficultyLevel::Advanced.to_string(), "ADVANCED");
        assert!("EXPERT".parse::<DifficultyLevel>().is_err());
    }

    #[test]
    fn module_level_serializes_screaming_case() {
        let module = CourseModule {
            id: "m1".into(),
            title: "Intro".into(),
            description: "Basics".into(),
            level: DifficultyLevel::Intermediate,
            order: 0,
            is_active: true,
            course_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let value = serde_json::to_value(&module).unwrap();
        assert_eq!(value["level"], "INTERMEDIATE");
        assert_eq!(value["isActive"], true);
    }
}
