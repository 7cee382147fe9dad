pub mod error;
pub mod manager;
pub mod scheduler;

pub use error::QuotaError;
pub use manager::{QuotaManager, QuotaUsage};
pub use scheduler::RenewalScheduler;
