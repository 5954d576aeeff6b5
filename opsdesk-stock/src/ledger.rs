use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use opsdesk_core::{Operator, StorageError};

use crate::movement::{MovementDirection, MovementRequest, StockMovement};
use crate::store::StockStore;

#[derive(Debug, thiserror::Error)]
pub enum StockError {
    #[error("stock item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("movement quantity must be positive, got {0}")]
    InvalidQuantity(Decimal),

    #[error("insufficient stock for '{item}': requested {requested}, available {available}")]
    InsufficientStock {
        item: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The only writer of inventory balances.
///
/// Applies one movement at a time: balance update and log append happen in
/// the caller's transaction, so either both persist or neither does. This
/// component never touches the Financial Ledger; coupling a movement to a
/// money entry is the orchestrator's job.
#[derive(Debug, Default, Clone, Copy)]
pub struct StockLedger;

impl StockLedger {
    pub fn new() -> Self {
        Self
    }

    /// Apply one IN/OUT movement to an item.
    ///
    /// OUT movements that exceed the locked balance fail with
    /// `InsufficientStock` and write nothing; there is no partial deduction.
    pub async fn apply_movement(
        &self,
        store: &mut dyn StockStore,
        request: MovementRequest,
        operator: &Operator,
    ) -> Result<StockMovement, StockError> {
        if request.quantity <= Decimal::ZERO {
            return Err(StockError::InvalidQuantity(request.quantity));
        }

        let item = store.lock_item(request.item_id).await.map_err(|e| match e {
            StorageError::NotFound(_) => StockError::ItemNotFound(request.item_id),
            other => StockError::Storage(other),
        })?;

        let balance = match request.direction {
            MovementDirection::Out => {
                if item.quantity < request.quantity {
                    return Err(StockError::InsufficientStock {
                        item: item.name.clone(),
                        requested: request.quantity,
                        available: item.quantity,
                    });
                }
                item.quantity - request.quantity
            }
            MovementDirection::In => item.quantity + request.quantity,
        };

        store.save_item_quantity(item.id, balance).await?;

        let movement = StockMovement {
            id: Uuid::new_v4(),
            company_id: request.company_id,
            item_id: request.item_id,
            direction: request.direction,
            quantity: request.quantity,
            unit_price: request.unit_price,
            customer_id: request.customer_id,
            supplier_id: request.supplier_id,
            serial_number: request.serial_number,
            note: request.note,
            operator_id: Some(operator.user_id),
            moved_at: Utc::now(),
        };
        store.insert_movement(&movement).await?;

        tracing::debug!(
            item = %item.name,
            direction = movement.direction.as_str(),
            quantity = %movement.quantity,
            balance = %balance,
            "stock movement applied"
        );

        if balance <= item.minimum_quantity {
            // Notification delivery is out of scope; the alert is logged.
            tracing::warn!(
                item = %item.name,
                balance = %balance,
                minimum = %item.minimum_quantity,
                "stock at or below minimum threshold"
            );
        }

        Ok(movement)
    }
}
