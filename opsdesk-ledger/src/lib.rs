pub mod entry;
pub mod installments;
pub mod ledger;
pub mod period;
pub mod store;

pub use entry::{Category, EntryDirection, EntryStatus, FinancialEntry, PaymentMethod};
pub use installments::{split, Installment, MAX_INSTALLMENTS};
pub use ledger::{FinancialLedger, InstallmentSpec, LedgerError};
pub use period::{MonthLockGuard, PeriodLock};
pub use store::LedgerStore;
