use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use opsdesk_core::Operator;

use crate::ledger::LedgerError;
use crate::store::LedgerStore;

/// Marker closing a (company, year, month) financial period.
///
/// Never edited after creation; its existence alone blocks further writes
/// into the period. Uniqueness per key is enforced by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodLock {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub year: i32,
    pub month: u32,
    pub closed_by: Option<Uuid>,
    pub closed_at: DateTime<Utc>,
}

/// Validation gate in front of every financial write.
///
/// Runs inside the caller's session, never in a transaction of its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonthLockGuard;

impl MonthLockGuard {
    pub fn new() -> Self {
        Self
    }

    /// Fail with `PeriodClosed` if the month containing `date` has been
    /// closed for this company.
    pub async fn assert_open(
        &self,
        store: &mut dyn LedgerStore,
        company_id: Option<Uuid>,
        date: NaiveDate,
    ) -> Result<(), LedgerError> {
        let (year, month) = (date.year(), date.month());
        if store.period_lock_exists(company_id, year, month).await? {
            return Err(LedgerError::PeriodClosed { year, month });
        }
        Ok(())
    }

    /// Close a period. Refuses with `AlreadyClosed` when a lock row already
    /// exists; concurrent closers racing past the check are resolved to a
    /// single winner by the store's unique key.
    pub async fn close(
        &self,
        store: &mut dyn LedgerStore,
        company_id: Option<Uuid>,
        year: i32,
        month: u32,
        operator: &Operator,
    ) -> Result<PeriodLock, LedgerError> {
        if store.period_lock_exists(company_id, year, month).await? {
            return Err(LedgerError::AlreadyClosed { year, month });
        }

        let lock = PeriodLock {
            id: Uuid::new_v4(),
            company_id,
            year,
            month,
            closed_by: Some(operator.user_id),
            closed_at: Utc::now(),
        };
        store.insert_period_lock(&lock).await.map_err(|e| match e {
            opsdesk_core::StorageError::Duplicate(_) => LedgerError::AlreadyClosed { year, month },
            other => LedgerError::Storage(other),
        })?;

        tracing::info!(year, month, company = ?company_id, "financial period closed");
        Ok(lock)
    }
}
