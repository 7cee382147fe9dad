use std::sync::Arc;

use learnhub_model::Account;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::storage::{AiUsageLog, ConsumeOutcome, LearnhubDatabase, StorageError, UsageLogFilter};

use super::error::QuotaError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub account_id: String,
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub exhausted: bool,
}

impl QuotaUsage {
    fn new(account_id: &str, used: u32, limit: u32) -> Self {
        Self {
            account_id: account_id.to_string(),
            used,
            limit,
            remaining: limit.saturating_sub(used),
            exhausted: used >= limit,
        }
    }
}

impl From<&Account> for QuotaUsage {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id.clone(),
            used: account.ai_requests_used,
            limit: account.ai_requests_limit,
            remaining: account.remaining_ai_requests(),
            exhausted: account.is_ai_quota_exhausted(),
        }
    }
}

/// Gates AI requests against per-account allowances and renews them.
#[derive(Clone)]
pub struct QuotaManager {
    database: Arc<LearnhubDatabase>,
}

impl QuotaManager {
    pub fn new(database: Arc<LearnhubDatabase>) -> Self {
        Self { database }
    }

    /// Resets every account's AI usage counter to zero, regardless of plan or
    /// current value. Returns the number of accounts touched.
    pub fn renew_all(&self) -> Result<usize, QuotaError> {
        let accounts = self.database.reset_all_ai_usage()?;
        info!(category = "QUOTA", accounts, "renewed AI request limits for all accounts");
        Ok(accounts)
    }

    /// Counts one AI request against the account. Refused requests are
    /// recorded but leave the counter unchanged.
    pub fn consume(&self, account_id: &str, message: &str) -> Result<QuotaUsage, QuotaError> {
        if message.trim().is_empty() {
            return Err(QuotaError::InvalidRequest("message cannot be empty".into()));
        }

        match self.database.consume_ai_request(account_id, message) {
            Ok(ConsumeOutcome::Granted { used, limit }) => {
                debug!(category = "QUOTA", account_id, used, limit, "AI request granted");
                Ok(QuotaUsage::new(account_id, used, limit))
            }
            Ok(ConsumeOutcome::LimitReached { used, limit }) => {
                info!(category = "QUOTA", account_id, used, limit, "AI request refused, quota exhausted");
                Err(QuotaError::LimitExceeded {
                    account_id: account_id.to_string(),
                    limit,
                    used,
                })
            }
            Err(StorageError::NotFound(_)) => Err(QuotaError::AccountNotFound(account_id.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    pub fn usage(&self, account_id: &str) -> Result<QuotaUsage, QuotaError> {
        let account = self
            .database
            .get_account(account_id)?
            .ok_or_else(|| QuotaError::AccountNotFound(account_id.to_string()))?;

        Ok(QuotaUsage::from(&account))
    }

    pub fn usage_logs(&self, filter: &UsageLogFilter) -> Result<(Vec<AiUsageLog>, usize), QuotaError> {
        Ok(self.database.query_ai_usage(filter)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewAccount;
    use tempfile::tempdir;

    fn account(db: &LearnhubDatabase, email: &str, limit: u32) -> String {
        db.create_account(
            NewAccount {
                name: "Ana".into(),
                email: email.into(),
                password_hash: "hash".into(),
                ..Default::default()
            },
            limit,
        )
        .unwrap()
        .id
    }

    fn counters(db: &LearnhubDatabase) -> Vec<(String, u32, u32)> {
        let mut rows: Vec<_> = db
            .list_accounts()
            .unwrap()
            .into_iter()
            .map(|a| (a.id, a.ai_requests_used, a.ai_requests_limit))
            .collect();
        rows.sort();
        rows
    }

    #[test]
    fn renewal_is_idempotent() {
        let dir = tempdir().unwrap();
        let db = Arc::new(LearnhubDatabase::new(dir.path().to_path_buf()).unwrap());
        let quota = QuotaManager::new(Arc::clone(&db));
        let ana = account(&db, "ana@example.com", 2);
        let bruno = account(&db, "bruno@example.com", 3);

        for (id, limit) in [(&ana, 2), (&bruno, 3)] {
            for _ in 0..limit {
                quota.consume(id, "Explique iteradores").unwrap();
            }
            assert!(quota.usage(id).unwrap().exhausted);
        }

        for _ in 0..2 {
            assert_eq!(quota.renew_all().unwrap(), 2);
            for (id, used, _) in counters(&db) {
                assert_eq!(used, 0, "{id} not renewed");
            }
        }

        let before = counters(&db);
        let mut limits: Vec<u32> = before.iter().map(|(_, _, limit)| *limit).collect();
        limits.sort();
        assert_eq!(limits, vec![2, 3]);
        assert_eq!(quota.renew_all().unwrap(), 2);
        assert_eq!(counters(&db), before);
    }

    #[test]
    fn usage_reports_remaining_and_exhaustion() {
        let dir = tempdir().unwrap();
        let db = Arc::new(LearnhubDatabase::new(dir.path().to_path_buf()).unwrap());
        let quota = QuotaManager::new(Arc::clone(&db));
        let id = account(&db, "ana@example.com", 2);

        let granted = quota.consume(&id, "Explique traits").unwrap();
        assert_eq!(granted, quota.usage(&id).unwrap());
        assert_eq!((granted.remaining, granted.exhausted), (1, false));

        quota.consume(&id, "Explique lifetimes").unwrap();
        let usage = quota.usage(&id).unwrap();
        assert_eq!((usage.used, usage.remaining, usage.exhausted), (2, 0, true));

        assert!(matches!(
            quota.consume(&id, "mais uma"),
            Err(QuotaError::LimitExceeded { used: 2, limit: 2, .. })
        ));
        assert!(matches!(
            quota.usage("ghost"),
            Err(QuotaError::AccountNotFound(_))
        ));
    }
}
