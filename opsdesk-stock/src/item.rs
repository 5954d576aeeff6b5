use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A catalogued product with a cached stock balance.
///
/// `quantity` is a denormalization of the movement log: it must equal the
/// running sum of IN minus OUT movements at all times. Only the Stock Ledger
/// mutates it, and only inside the same transaction that appends the
/// movement. Reads of the cached value are only trusted under the row lock
/// taken for a deduction decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockItem {
    pub id: Uuid,
    pub name: String,
    /// Balance at or below this threshold triggers a low-stock warning.
    pub minimum_quantity: Decimal,
    pub suggested_unit_price: Decimal,
    pub quantity: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    /// New catalogue entry with zero balance; stock arrives via IN movements.
    pub fn new(
        name: impl Into<String>,
        minimum_quantity: Decimal,
        suggested_unit_price: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            minimum_quantity,
            suggested_unit_price,
            quantity: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}
