use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::ApiState;

pub fn create_router(state: Arc<ApiState>) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout()));

    Router::new()
        .route(
            "/api/admin/backup",
            get(handlers::list_backups).post(handlers::backup_action),
        )
        .route(
            "/api/admin/backup/:filename",
            get(handlers::get_backup).delete(handlers::delete_backup),
        )
        .route(
            "/api/admin/backup/:filename/restore",
            post(handlers::restore_backup),
        )
        .route("/api/admin/quota/renew", post(handlers::renew_limits))
        .route("/api/admin/ai-logs", get(handlers::query_ai_logs))
        .route("/api/quota/:account_id", get(handlers::get_quota))
        .route("/api/quota/:account_id/consume", post(handlers::consume_quota))
        .route("/health", get(handlers::health_check))
        .with_state(state)
        .layer(middleware)
}
