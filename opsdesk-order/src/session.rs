use async_trait::async_trait;
use uuid::Uuid;

use opsdesk_core::StorageError;
use opsdesk_ledger::LedgerStore;
use opsdesk_stock::StockStore;

use crate::order::ServiceOrder;

/// Order-side storage surface, scoped to one open transaction.
#[async_trait]
pub trait OrderStore: Send {
    /// Load the order under an exclusive lock; `None` when it does not
    /// exist.
    async fn lock_order(&mut self, id: Uuid) -> Result<Option<ServiceOrder>, StorageError>;

    /// Must enforce protocol uniqueness and report a violation as
    /// `StorageError::Duplicate`.
    async fn insert_order(&mut self, order: &ServiceOrder) -> Result<(), StorageError>;

    async fn update_order(&mut self, order: &ServiceOrder) -> Result<(), StorageError>;

    /// Greatest stored protocol starting with `prefix`, locking what it
    /// reads so same-day creations serialize.
    async fn latest_protocol(&mut self, prefix: &str) -> Result<Option<String>, StorageError>;
}

/// One failure-atomic unit of work across all three component stores.
///
/// Dropping a session without committing rolls every write back; there is
/// no compensating-action path anywhere in the engine.
#[async_trait]
pub trait FulfillmentSession: Send {
    fn stock(&mut self) -> &mut dyn StockStore;
    fn ledger(&mut self) -> &mut dyn LedgerStore;
    fn orders(&mut self) -> &mut dyn OrderStore;

    async fn commit(self: Box<Self>) -> Result<(), StorageError>;
}

/// Handed to the orchestrator at construction time; the orchestrator is the
/// only component that begins and commits sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn FulfillmentSession>, StorageError>;
}
