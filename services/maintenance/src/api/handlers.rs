use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use tracing::{error, info, warn};

use crate::backup::BackupError;
use crate::quota::{QuotaError, QuotaUsage};
use crate::storage::UsageLogFilter;

use super::types::{
    AiLogsQuery, AiLogsResponse, BackupActionRequest, BackupListResponse, BackupListing,
    ConsumeRequest, CreateBackupResponse, ErrorResponse, HealthResponse, MessageResponse,
    RenewLimitsResponse, RestoreBackupResponse,
};
use super::ApiState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

const RENEW_AI_LIMITS_ACTION: &str = "renew-ai-limits";
const MAX_LOG_PAGE: usize = 500;

pub async fn list_backups(State(state): State<Arc<ApiState>>) -> ApiResult<BackupListResponse> {
    let filenames = state.backups.list_backups().map_err(backup_error)?;

    let backups = filenames
        .into_iter()
        .map(|filename| match state.backups.backup_info(&filename) {
            Ok(info) => BackupListing::Info(info),
            Err(err) => {
                warn!(category = "BACKUP", filename = %filename, error = %err, "unreadable backup in listing");
                BackupListing::Unreadable {
                    filename,
                    error: err.to_string(),
                }
            }
        })
        .collect();

    Ok(Json(BackupListResponse { backups }))
}

/// `POST /api/admin/backup`: creates a backup, or renews AI limits when the
/// body carries `{"action": "renew-ai-limits"}`. An empty body creates a
/// backup; a body that does not parse is rejected.
pub async fn backup_action(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    let action = parse_backup_action(&body)?;

    match action.as_deref() {
        None => {
            let filename = state.backups.create_backup().map_err(backup_error)?;
            Ok(Json(serde_json::json!(CreateBackupResponse {
                message: "Backup created successfully".to_string(),
                filename,
            })))
        }
        Some(RENEW_AI_LIMITS_ACTION) => {
            let accounts = state.quota.renew_all().map_err(quota_error)?;
            info!(category = "QUOTA", accounts, "AI limits renewed from backup endpoint");
            Ok(Json(serde_json::json!(MessageResponse {
                message: "AI request limits renewed successfully".to_string(),
            })))
        }
        Some(other) => Err(bad_request(
            "invalid_action",
            &format!("unknown action: {other}"),
        )),
    }
}

fn parse_backup_action(body: &[u8]) -> Result<Option<String>, (StatusCode, Json<ErrorResponse>)> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let request: BackupActionRequest = serde_json::from_slice(body).map_err(|err| {
        warn!(category = "BACKUP", error = %err, "rejected malformed backup action body");
        bad_request("invalid_body", &format!("invalid request body: {err}"))
    })?;

    Ok(request.action.filter(|action| !action.trim().is_empty()))
}

pub async fn get_backup(
    State(state): State<Arc<ApiState>>,
    Path(filename): Path<String>,
) -> ApiResult<crate::backup::BackupInfo> {
    let info = state.backups.backup_info(&filename).map_err(backup_error)?;
    Ok(Json(info))
}

pub async fn restore_backup(
    State(state): State<Arc<ApiState>>,
    Path(filename): Path<String>,
) -> ApiResult<RestoreBackupResponse> {
    let summary = state.backups.restore_backup(&filename).map_err(backup_error)?;

    Ok(Json(RestoreBackupResponse {
        message: "Backup restored successfully".to_string(),
        restored: summary.restored,
    }))
}

pub async fn delete_backup(
    State(state): State<Arc<ApiState>>,
    Path(filename): Path<String>,
) -> ApiResult<MessageResponse> {
    state.backups.delete_backup(&filename).map_err(backup_error)?;

    Ok(Json(MessageResponse {
        message: "Backup deleted successfully".to_string(),
    }))
}

pub async fn renew_limits(State(state): State<Arc<ApiState>>) -> ApiResult<RenewLimitsResponse> {
    let accounts = state.quota.renew_all().map_err(quota_error)?;

    Ok(Json(RenewLimitsResponse {
        message: "AI request limits renewed successfully".to_string(),
        accounts,
    }))
}

pub async fn get_quota(
    State(state): State<Arc<ApiState>>,
    Path(account_id): Path<String>,
) -> ApiResult<QuotaUsage> {
    let usage = state.quota.usage(&account_id).map_err(quota_error)?;
    Ok(Json(usage))
}

pub async fn consume_quota(
    State(state): State<Arc<ApiState>>,
    Path(account_id): Path<String>,
    Json(request): Json<ConsumeRequest>,
) -> ApiResult<QuotaUsage> {
    let usage = state
        .quota
        .consume(&account_id, &request.message)
        .map_err(quota_error)?;
    Ok(Json(usage))
}

pub async fn query_ai_logs(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<AiLogsQuery>,
) -> ApiResult<AiLogsResponse> {
    let from = query
        .date_from
        .as_deref()
        .map(|raw| parse_date_bound(raw, false))
        .transpose()
        .map_err(|raw| bad_request("invalid_date", &format!("invalid dateFrom: {raw}")))?;
    let to = query
        .date_to
        .as_deref()
        .map(|raw| parse_date_bound(raw, true))
        .transpose()
        .map_err(|raw| bad_request("invalid_date", &format!("invalid dateTo: {raw}")))?;

    let defaults = UsageLogFilter::default();
    let filter = UsageLogFilter {
        account_id: query.user_id.filter(|id| !id.is_empty()),
        status: query.status.filter(|status| !status.is_empty()),
        from,
        to,
        limit: query.limit.unwrap_or(defaults.limit).clamp(1, MAX_LOG_PAGE),
        skip: query.skip.unwrap_or(0),
    };

    let (logs, total) = state.quota.usage_logs(&filter).map_err(quota_error)?;
    Ok(Json(AiLogsResponse { logs, total }))
}

pub async fn health_check(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

    match state.database.ping() {
        Ok(()) => Ok(Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp,
            database: "connected".to_string(),
            error: None,
        })),
        Err(err) => {
            error!(error = %err, "health check failed to reach the database");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    timestamp,
                    database: "disconnected".to_string(),
                    error: Some(err.to_string()),
                }),
            ))
        }
    }
}

/// Accepts RFC 3339 instants or plain `YYYY-MM-DD` dates. A plain date used
/// as an upper bound covers the whole day.
fn parse_date_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, String> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| raw.to_string())?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    time.map(|naive| naive.and_utc()).ok_or_else(|| raw.to_string())
}

fn backup_error(err: BackupError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        BackupError::NotFound(filename) => not_found(
            "backup_not_found",
            &format!("backup {filename} not found"),
        ),
        BackupError::InvalidFilename(filename) => bad_request(
            "invalid_filename",
            &format!("invalid backup filename: {filename}"),
        ),
        BackupError::Rejected(reason) => {
            warn!(category = "BACKUP", error = %reason, "backup rejected");
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "backup rejected".to_string(),
                    code: "backup_rejected".to_string(),
                    details: Some(serde_json::json!({ "message": reason.to_string() })),
                }),
            )
        }
        BackupError::Malformed { filename, source } => {
            error!(category = "BACKUP", filename = %filename, error = %source, "malformed backup file");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "malformed backup file".to_string(),
                    code: "malformed_backup".to_string(),
                    details: Some(serde_json::json!({
                        "filename": filename,
                        "message": source.to_string(),
                    })),
                }),
            )
        }
        other => internal_error("BACKUP", other),
    }
}

fn quota_error(err: QuotaError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        QuotaError::LimitExceeded {
            account_id,
            limit,
            used,
        } => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                error: "AI request limit reached".to_string(),
                code: "quota_exceeded".to_string(),
                details: Some(serde_json::json!({
                    "accountId": account_id,
                    "limit": limit,
                    "used": used,
                })),
            }),
        ),
        QuotaError::AccountNotFound(account_id) => not_found(
            "account_not_found",
            &format!("account {account_id} not found"),
        ),
        QuotaError::InvalidRequest(message) => bad_request("invalid_request", &message),
        other => internal_error("QUOTA", other),
    }
}

fn bad_request(code: &str, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
            code: code.to_string(),
            details: None,
        }),
    )
}

fn not_found(code: &str, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: message.to_string(),
            code: code.to_string(),
            details: None,
        }),
    )
}

fn internal_error<E: std::fmt::Display>(
    category: &'static str,
    err: E,
) -> (StatusCode, Json<ErrorResponse>) {
    error!(category, error = %err, "maintenance API internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "internal server error".to_string(),
            code: "internal_error".to_string(),
            details: Some(serde_json::json!({ "message": err.to_string() })),
        }),
    )
}
