use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Signed direction of a stock movement.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementDirection {
    In,
    Out,
}

impl MovementDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementDirection::In => "IN",
            MovementDirection::Out => "OUT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "IN" => Some(MovementDirection::In),
            "OUT" => Some(MovementDirection::Out),
            _ => None,
        }
    }
}

/// One immutable inventory fact. Appended once, never edited or deleted;
/// the movement log is the authoritative history behind every item balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub item_id: Uuid,
    pub direction: MovementDirection,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Counterparty on a sale/consumption (OUT) movement.
    pub customer_id: Option<Uuid>,
    /// Counterparty on a purchase (IN) movement.
    pub supplier_id: Option<Uuid>,
    pub serial_number: Option<String>,
    pub note: Option<String>,
    pub operator_id: Option<Uuid>,
    pub moved_at: DateTime<Utc>,
}

/// Input for `StockLedger::apply_movement`.
#[derive(Debug, Clone)]
pub struct MovementRequest {
    pub company_id: Option<Uuid>,
    pub item_id: Uuid,
    pub direction: MovementDirection,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub customer_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub serial_number: Option<String>,
    pub note: Option<String>,
}

impl MovementRequest {
    pub fn new(
        item_id: Uuid,
        direction: MovementDirection,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Self {
        Self {
            company_id: None,
            item_id,
            direction,
            quantity,
            unit_price,
            customer_id: None,
            supplier_id: None,
            serial_number: None,
            note: None,
        }
    }
}
