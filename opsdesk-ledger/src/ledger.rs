use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use opsdesk_core::StorageError;

use crate::entry::{
    Category, EntryDirection, EntryStatus, FinancialEntry, PaymentMethod,
};
use crate::installments::split;
use crate::period::MonthLockGuard;
use crate::store::LedgerStore;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("financial period {month:02}/{year} is closed")]
    PeriodClosed { year: i32, month: u32 },

    #[error("financial period {month:02}/{year} is already closed")]
    AlreadyClosed { year: i32, month: u32 },

    #[error("installment count must be between 1 and 60, got {0}")]
    InvalidInstallmentCount(u32),

    #[error("installment due date out of range")]
    DueDateOutOfRange,

    #[error("financial entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("entry {0} is already paid")]
    AlreadyPaid(Uuid),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Everything needed to record one split total.
#[derive(Debug, Clone)]
pub struct InstallmentSpec {
    pub company_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub technician_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub description: String,
    pub total: Decimal,
    pub direction: EntryDirection,
    pub category: Category,
    pub payment_method: PaymentMethod,
    pub count: u32,
    pub due_start: NaiveDate,
}

/// Owner of money-movement records and their lifecycle.
///
/// Every write goes through the Month Lock Guard first; a closed period
/// aborts the write before anything is persisted.
#[derive(Debug, Default, Clone, Copy)]
pub struct FinancialLedger {
    guard: MonthLockGuard,
}

impl FinancialLedger {
    pub fn new() -> Self {
        Self {
            guard: MonthLockGuard::new(),
        }
    }

    /// Persist one entry in the caller's session.
    ///
    /// Recomputes the lifecycle status on the way in: an unpaid entry whose
    /// due date has passed becomes OVERDUE, otherwise PENDING.
    pub async fn record(
        &self,
        store: &mut dyn LedgerStore,
        mut entry: FinancialEntry,
    ) -> Result<FinancialEntry, LedgerError> {
        self.guard
            .assert_open(store, entry.company_id, entry.due_date)
            .await?;

        entry.refresh_status(Utc::now().date_naive());
        entry.updated_at = Utc::now();
        store.insert_entry(&entry).await?;

        tracing::debug!(
            entry = %entry.id,
            amount = %entry.amount,
            direction = entry.direction.as_str(),
            category = entry.category.as_str(),
            due = %entry.due_date,
            "financial entry recorded"
        );
        Ok(entry)
    }

    /// Split a total into due-dated installments and record the whole set.
    ///
    /// All rows share one freshly generated group id and the declared count;
    /// they live in the caller's single session, so a mid-batch failure
    /// (e.g. a later installment landing in a closed month) leaves no
    /// partial group behind.
    pub async fn record_installments(
        &self,
        store: &mut dyn LedgerStore,
        spec: InstallmentSpec,
    ) -> Result<Vec<FinancialEntry>, LedgerError> {
        let plan = split(spec.total, spec.count, spec.due_start)?;
        let group = Uuid::new_v4();

        let mut recorded = Vec::with_capacity(plan.len());
        for part in plan {
            let description = if spec.count > 1 {
                format!("{} ({}/{})", spec.description, part.number, spec.count)
            } else {
                spec.description.clone()
            };

            let mut entry = FinancialEntry::new(
                description,
                part.amount,
                spec.direction,
                spec.category,
                part.due_date,
            );
            entry.company_id = spec.company_id;
            entry.customer_id = spec.customer_id;
            entry.technician_id = spec.technician_id;
            entry.supplier_id = spec.supplier_id;
            entry.payment_method = spec.payment_method;
            entry.installment_number = part.number;
            entry.installment_count = spec.count;
            entry.installment_group = Some(group);

            recorded.push(self.record(store, entry).await?);
        }

        tracing::info!(
            group = %group,
            count = spec.count,
            total = %spec.total,
            "installment group recorded"
        );
        Ok(recorded)
    }

    /// Mark an entry paid, freezing its status. Amount and due date are not
    /// touched by this path; once paid they stay immutable.
    pub async fn settle(
        &self,
        store: &mut dyn LedgerStore,
        entry_id: Uuid,
        paid_date: NaiveDate,
        method: PaymentMethod,
        receipt_ref: Option<String>,
    ) -> Result<FinancialEntry, LedgerError> {
        let mut entry = store
            .get_entry(entry_id)
            .await?
            .ok_or(LedgerError::EntryNotFound(entry_id))?;

        if entry.is_paid() {
            return Err(LedgerError::AlreadyPaid(entry_id));
        }
        // Updates are gated the same way creates are.
        self.guard
            .assert_open(store, entry.company_id, entry.due_date)
            .await?;

        entry.status = EntryStatus::Paid;
        entry.paid_date = Some(paid_date);
        entry.payment_method = method;
        if receipt_ref.is_some() {
            entry.receipt_ref = receipt_ref;
        }
        entry.updated_at = Utc::now();
        store.update_entry(&entry).await?;

        tracing::debug!(entry = %entry.id, paid = %paid_date, "financial entry settled");
        Ok(entry)
    }

    /// Close a (company, year, month) period against further writes.
    pub async fn close_period(
        &self,
        store: &mut dyn LedgerStore,
        company_id: Option<Uuid>,
        year: i32,
        month: u32,
        operator: &opsdesk_core::Operator,
    ) -> Result<crate::period::PeriodLock, LedgerError> {
        self.guard.close(store, company_id, year, month, operator).await
    }
}
