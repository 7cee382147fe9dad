use learnhub_model::SnapshotCounts;
use serde::{Deserialize, Serialize};

use crate::backup::BackupInfo;
use crate::storage::AiUsageLog;

/// Body accepted by `POST /api/admin/backup`. Without an action a backup is
/// created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupActionRequest {
    pub action: Option<String>,
}

/// One entry of the backup listing. Files that cannot be read are still
/// listed, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackupListing {
    Info(BackupInfo),
    Unreadable { filename: String, error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupListResponse {
    pub backups: Vec<BackupListing>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBackupResponse {
    pub message: String,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreBackupResponse {
    pub message: String,
    pub restored: SnapshotCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewLimitsResponse {
    pub message: String,
    pub accounts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumeRequest {
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiLogsQuery {
    pub user_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiLogsResponse {
    pub logs: Vec<AiUsageLog>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub details: Option<serde_json::Value>,
}
