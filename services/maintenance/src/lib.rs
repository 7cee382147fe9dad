pub mod api;
pub mod backup;
pub mod clock;
pub mod config;
pub mod quota;
pub mod storage;

pub use api::{create_router, ApiState, ErrorResponse};
pub use backup::{BackupError, BackupInfo, BackupService, RestoreIdPolicy, RestoreSummary};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MaintenanceConfig;
pub use quota::{QuotaError, QuotaManager, QuotaUsage, RenewalScheduler};
pub use storage::{LearnhubDatabase, StorageError};
