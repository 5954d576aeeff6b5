pub mod order;
pub mod orchestrator;
pub mod protocol;
pub mod session;

pub use order::{OrderDraft, OrderItem, OrderItemDraft, OrderStatus, ServiceOrder};
pub use orchestrator::{
    FulfillmentOrchestrator, PurchaseReceipt, PurchaseRequest, SaleReceipt, SaleRequest,
};
pub use protocol::SequenceAssigner;
pub use session::{FulfillmentSession, OrderStore, SessionFactory};

use uuid::Uuid;

use opsdesk_core::StorageError;
use opsdesk_ledger::LedgerError;
use opsdesk_stock::StockError;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("order not found: {0}")]
    NotFound(Uuid),

    #[error("order {protocol} is already in a terminal state")]
    AlreadyFinalized { protocol: String },

    #[error("invalid order transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Stock(#[from] StockError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
