use std::sync::Arc;

pub mod handlers;
pub mod router;
pub mod types;

pub use router::create_router;
pub use types::*;

use crate::backup::BackupService;
use crate::config::MaintenanceConfig;
use crate::quota::QuotaManager;
use crate::storage::LearnhubDatabase;

pub struct ApiState {
    pub database: Arc<LearnhubDatabase>,
    pub backups: Arc<BackupService>,
    pub quota: Arc<QuotaManager>,
    pub config: Arc<MaintenanceConfig>,
}

impl ApiState {
    pub fn new(
        database: Arc<LearnhubDatabase>,
        backups: Arc<BackupService>,
        quota: Arc<QuotaManager>,
        config: MaintenanceConfig,
    ) -> Self {
        Self {
            database,
            backups,
            quota,
            config: Arc::new(config),
        }
    }
}
