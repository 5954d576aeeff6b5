use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use opsdesk_core::StorageError;

use crate::item::StockItem;
use crate::movement::StockMovement;

/// Storage surface the Stock Ledger needs, scoped to one open transaction.
///
/// `lock_item` must take an exclusive lock on the item row so that the
/// read-then-write deduction decision serializes against concurrent callers.
#[async_trait]
pub trait StockStore: Send {
    async fn lock_item(&mut self, item_id: Uuid) -> Result<StockItem, StorageError>;

    async fn save_item_quantity(
        &mut self,
        item_id: Uuid,
        quantity: Decimal,
    ) -> Result<(), StorageError>;

    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<(), StorageError>;
}
