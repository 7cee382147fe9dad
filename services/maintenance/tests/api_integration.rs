use std::fs;
use std::sync::Arc;

use anyhow::Result;
use learnhub_maintenance::storage::{NewAccount, NewModule};
use learnhub_maintenance::{
    create_router, ApiState, BackupService, LearnhubDatabase, MaintenanceConfig, QuotaManager,
};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

struct TestService {
    _temp: TempDir,
    database: Arc<LearnhubDatabase>,
    config: MaintenanceConfig,
    base_url: String,
    handle: JoinHandle<()>,
}

impl TestService {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn teardown(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

async fn start_service() -> Result<TestService> {
    let temp = tempdir()?;
    let config = MaintenanceConfig {
        server_port: 0,
        data_dir: temp.path().join("data"),
        backup_dir: temp.path().join("backups"),
        request_timeout_secs: 5,
        log_level: "warn".to_string(),
        ..Default::default()
    };
    config.validate()?;

    let database = Arc::new(LearnhubDatabase::new(config.data_dir.clone())?);
    let backups = Arc::new(BackupService::new(Arc::clone(&database), &config)?);
    let quota = Arc::new(QuotaManager::new(Arc::clone(&database)));
    let state = Arc::new(ApiState::new(
        Arc::clone(&database),
        backups,
        quota,
        config.clone(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    let router = create_router(state);
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router.into_make_service()).await;
    });

    Ok(TestService {
        _temp: temp,
        database,
        config,
        base_url,
        handle,
    })
}

fn add_account(db: &LearnhubDatabase, email: &str, limit: u32) -> String {
    db.create_account(
        NewAccount {
            name: "Ana".into(),
            email: email.into(),
            password_hash: "hash".into(),
            ..Default::default()
        },
        limit,
    )
    .expect("account created")
    .id
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reports_database_status() -> Result<()> {
    let service = start_service().await?;
    let client = Client::new();

    let response = client.get(service.url("/health")).send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "healthy");
    assert!(body.get("error").is_none());
    assert_eq!(body["database"], "connected");
    assert!(body["timestamp"].as_str().is_some());

    service.teardown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn backup_create_list_inspect_delete() -> Result<()> {
    let service = start_service().await?;
    let client = Client::new();
    add_account(&service.database, "ana@example.com", 10);
    service.database.create_module(NewModule {
        title: "Fundamentos".into(),
        description: "Primeiros passos".into(),
        ..Default::default()
    })?;

    let response = client.post(service.url("/api/admin/backup")).send().await?;
    assert_eq!(response.status(), StatusCode::OK);
    let created: Value = response.json().await?;
    let filename = created["filename"].as_str().expect("filename").to_string();
    assert!(filename.starts_with("backup-") && filename.ends_with(".json"));
    assert_eq!(created["message"], "Backup created successfully");

    let listing: Value = client
        .get(service.url("/api/admin/backup"))
        .send()
        .await?
        .json()
        .await?;
    let backups = listing["backups"].as_array().expect("backups array");
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0]["filename"], filename.as_str());
    assert_eq!(backups[0]["users"], 1);
    assert_eq!(backups[0]["modules"], 1);
    assert_eq!(backups[0]["version"], "1.0.0");

    let info: Value = client
        .get(service.url(&format!("/api/admin/backup/{filename}")))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(info["lessons"], 0);
    assert!(info["size"].as_u64().unwrap_or(0) > 0);

    let response = client
        .delete(service.url(&format!("/api/admin/backup/{filename}")))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .get(service.url(&format!("/api/admin/backup/{filename}")))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await?;
    assert_eq!(body["code"], "backup_not_found");

    service.teardown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn restore_replaces_data_and_reports_counts() -> Result<()> {
    let service = start_service().await?;
    let client = Client::new();
    add_account(&service.database, "ana@example.com", 10);

    let created: Value = client
        .post(service.url("/api/admin/backup"))
        .json(&json!({}))
        .send()
        .await?
        .json()
        .await?;
    let filename = created["filename"].as_str().expect("filename").to_string();

    add_account(&service.database, "bruno@example.com", 10);
    assert_eq!(service.database.entity_counts()?.users, 2);

    let response = client
        .post(service.url(&format!("/api/admin/backup/{filename}/restore")))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["message"], "Backup restored successfully");
    assert_eq!(body["restored"]["users"], 1);
    assert_eq!(service.database.entity_counts()?.users, 1);

    service.teardown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn restore_errors_leave_store_untouched() -> Result<()> {
    let service = start_service().await?;
    let client = Client::new();
    add_account(&service.database, "ana@example.com", 10);

    let response = client
        .post(service.url(
            "/api/admin/backup/backup-1999-01-01T00-00-00-000Z.json/restore",
        ))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .post(service.url("/api/admin/backup/%2E%2E%2Fescape.json/restore"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["code"], "invalid_filename");

    fs::write(service.config.backup_dir.join("backup-broken.json"), b"{ nope")?;
    let response = client
        .post(service.url("/api/admin/backup/backup-broken.json/restore"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await?;
    assert_eq!(body["code"], "malformed_backup");
    assert!(body["details"]["message"].as_str().is_some());

    let listing: Value = client
        .get(service.url("/api/admin/backup"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(listing["backups"][0]["filename"], "backup-broken.json");
    assert!(listing["backups"][0]["error"].as_str().is_some());

    assert_eq!(service.database.entity_counts()?.users, 1);

    service.teardown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn quota_gate_refuses_at_limit_and_renewal_restores_it() -> Result<()> {
    let service = start_service().await?;
    let client = Client::new();
    let account_id = add_account(&service.database, "ana@example.com", 2);
    let consume_url = service.url(&format!("/api/quota/{account_id}/consume"));

    for expected_used in 1..=2 {
        let response = client
            .post(&consume_url)
            .json(&json!({ "message": "Explique ownership" }))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let usage: Value = response.json().await?;
        assert_eq!(usage["used"], expected_used);
    }

    let response = client
        .post(&consume_url)
        .json(&json!({ "message": "Mais uma" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await?;
    assert_eq!(body["code"], "quota_exceeded");
    assert_eq!(body["details"]["limit"], 2);

    let logs: Value = client
        .get(service.url(&format!(
            "/api/admin/ai-logs?userId={account_id}&status=limit"
        )))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(logs["total"], 1);
    assert_eq!(logs["logs"][0]["userId"], account_id.as_str());
    assert_eq!(logs["logs"][0]["status"], "limit");

    let all: Value = client
        .get(service.url("/api/admin/ai-logs?limit=2&skip=1"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(all["total"], 3);
    assert_eq!(all["logs"].as_array().map(Vec::len), Some(2));

    let renewed: Value = client
        .post(service.url("/api/admin/quota/renew"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(renewed["accounts"], 1);

    let usage: Value = client
        .get(service.url(&format!("/api/quota/{account_id}")))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(usage["used"], 0);
    assert_eq!(usage["remaining"], 2);

    service.teardown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn backup_endpoint_actions() -> Result<()> {
    let service = start_service().await?;
    let client = Client::new();
    let account_id = add_account(&service.database, "ana@example.com", 5);
    service
        .database
        .consume_ai_request(&account_id, "Explique traits")?;

    let response = client
        .post(service.url("/api/admin/backup"))
        .json(&json!({ "action": "renew-ai-limits" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert!(body["message"].as_str().is_some());
    assert!(body.get("filename").is_none());
    assert_eq!(
        service
            .database
            .get_account(&account_id)?
            .map(|account| account.ai_requests_used),
        Some(0)
    );

    let response = client
        .post(service.url("/api/admin/backup"))
        .json(&json!({ "action": "format-disk" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["code"], "invalid_action");

    let listing: Value = client
        .get(service.url("/api/admin/backup"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(listing["backups"].as_array().map(Vec::len), Some(0));

    service.teardown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_backup_action_body_is_rejected() -> Result<()> {
    let service = start_service().await?;
    let client = Client::new();
    let account_id = add_account(&service.database, "ana@example.com", 5);
    service
        .database
        .consume_ai_request(&account_id, "Explique macros")?;

    for body in [r#"{"action":"renew-ai-limits""#, r#"{"action":42}"#] {
        let response = client
            .post(service.url("/api/admin/backup"))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        let error: Value = response.json().await?;
        assert_eq!(error["code"], "invalid_body");
    }

    assert!(service.database.list_accounts()?.iter().all(|a| a.ai_requests_used == 1));
    let listing: Value = client
        .get(service.url("/api/admin/backup"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(listing["backups"].as_array().map(Vec::len), Some(0));

    let response = client
        .post(service.url("/api/admin/backup"))
        .header("content-type", "application/json")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    service.teardown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn quota_errors_for_unknown_account_and_bad_input() -> Result<()> {
    let service = start_service().await?;
    let client = Client::new();

    let response = client
        .get(service.url("/api/quota/missing-account"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .post(service.url("/api/quota/missing-account/consume"))
        .json(&json!({ "message": "oi" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await?;
    assert_eq!(body["code"], "account_not_found");

    let account_id = add_account(&service.database, "ana@example.com", 5);
    let response = client
        .post(service.url(&format!("/api/quota/{account_id}/consume")))
        .json(&json!({ "message": "   " }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .get(service.url("/api/admin/ai-logs?dateFrom=yesterday"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    service.teardown().await;
    Ok(())
}
