use async_trait::async_trait;
use uuid::Uuid;

use opsdesk_core::StorageError;

use crate::entry::FinancialEntry;
use crate::period::PeriodLock;

/// Storage surface the Financial Ledger needs, scoped to one open
/// transaction.
#[async_trait]
pub trait LedgerStore: Send {
    async fn insert_entry(&mut self, entry: &FinancialEntry) -> Result<(), StorageError>;

    async fn update_entry(&mut self, entry: &FinancialEntry) -> Result<(), StorageError>;

    async fn get_entry(&mut self, id: Uuid) -> Result<Option<FinancialEntry>, StorageError>;

    async fn period_lock_exists(
        &mut self,
        company_id: Option<Uuid>,
        year: i32,
        month: u32,
    ) -> Result<bool, StorageError>;

    /// Must enforce uniqueness of (company, year, month) and report a
    /// violation as `StorageError::Duplicate`.
    async fn insert_period_lock(&mut self, lock: &PeriodLock) -> Result<(), StorageError>;
}
