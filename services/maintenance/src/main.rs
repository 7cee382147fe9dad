use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::serve;
use learnhub_maintenance::{
    create_router, ApiState, BackupService, LearnhubDatabase, MaintenanceConfig, QuotaManager,
    RenewalScheduler, SystemClock,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = MaintenanceConfig::from_env().context("failed to load configuration")?;
    init_tracing(&config);

    info!(
        host = %config.server_host,
        port = config.server_port,
        data_dir = %config.data_dir.display(),
        backup_dir = %config.backup_dir.display(),
        max_backups = config.max_backups,
        restore_id_policy = %config.restore_id_policy,
        "starting learnhub-maintenance service"
    );

    let database = Arc::new(
        LearnhubDatabase::new(config.data_dir.clone()).context("failed to open database")?,
    );
    let backups = Arc::new(
        BackupService::new(Arc::clone(&database), &config)
            .context("failed to prepare backup directory")?,
    );
    let quota = Arc::new(QuotaManager::new(Arc::clone(&database)));

    let scheduler = if config.enable_renewal_schedule {
        let scheduler = Arc::new(RenewalScheduler::new(
            Arc::clone(&quota),
            Arc::new(SystemClock),
            config.renewal_poll_interval(),
        ));
        scheduler.start();
        Some(scheduler)
    } else {
        info!(category = "QUOTA", "monthly renewal schedule disabled by configuration");
        None
    };

    let addr: SocketAddr = config
        .listen_addr()
        .parse()
        .context("invalid server bind address")?;

    let state = Arc::new(ApiState::new(
        Arc::clone(&database),
        backups,
        quota,
        config,
    ));
    let router = create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind TCP listener")?;
    let local_addr = listener
        .local_addr()
        .context("failed to read bound address")?;
    info!(%local_addr, "learnhub-maintenance listening");

    serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server encountered an unrecoverable error")?;

    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }

    info!("learnhub-maintenance shutdown complete");
    Ok(())
}

fn init_tracing(config: &MaintenanceConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
