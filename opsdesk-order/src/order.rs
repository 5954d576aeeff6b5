use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use opsdesk_ledger::PaymentMethod;

use crate::OrderError;

/// Lifecycle of a service order / support ticket.
///
/// FINALIZED is reached only through the orchestrator's `finalize`;
/// CANCELLED through a direct edit elsewhere. Both are terminal.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Open,
    Scheduled,
    InProgress,
    AwaitingPart,
    Finalized,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Finalized | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "OPEN",
            OrderStatus::Scheduled => "SCHEDULED",
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::AwaitingPart => "AWAITING_PART",
            OrderStatus::Finalized => "FINALIZED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(OrderStatus::Open),
            "SCHEDULED" => Some(OrderStatus::Scheduled),
            "IN_PROGRESS" => Some(OrderStatus::InProgress),
            "AWAITING_PART" => Some(OrderStatus::AwaitingPart),
            "FINALIZED" => Some(OrderStatus::Finalized),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// A consumed line item: product reference, quantity, and the unit price
/// agreed at the time it was added (not the catalogue suggestion).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.quantity * self.unit_price
    }
}

/// A unit of billable work: a support ticket or a service order.
///
/// Every field except `status`, `closed_at`, and `protocol` may be edited by
/// unrelated CRUD flows while the order is open; the orchestrator alone
/// drives the terminal transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOrder {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub technician_id: Option<Uuid>,
    /// Daily-sequential human-facing identifier, assigned once at creation.
    pub protocol: String,
    pub title: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub labor_amount: Decimal,
    pub discount: Decimal,
    /// Declared travel cost for on-site work.
    pub displacement_cost: Decimal,
    /// Declared outsourced-labor cost.
    pub third_party_cost: Decimal,
    pub installment_count: u32,
    pub payment_method: PaymentMethod,
    /// First revenue due date; defaults to the finalize date when absent.
    pub first_due_date: Option<NaiveDate>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceOrder {
    pub fn parts_total(&self) -> Decimal {
        self.items.iter().map(|i| i.line_total()).sum()
    }

    /// Parts plus labor minus discount; what the customer is charged.
    pub fn billable_total(&self) -> Decimal {
        self.parts_total() + self.labor_amount - self.discount
    }

    /// Move through the non-terminal part of the state machine. Terminal
    /// states are never left, and FINALIZED is reserved for `finalize`.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if self.status.is_terminal() || next == OrderStatus::Finalized {
            return Err(OrderError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub(crate) fn mark_finalized(&mut self, now: DateTime<Utc>) {
        self.status = OrderStatus::Finalized;
        self.closed_at = Some(now);
        self.updated_at = now;
    }
}

/// Line item as supplied at creation time.
#[derive(Debug, Clone)]
pub struct OrderItemDraft {
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

/// Input for `FulfillmentOrchestrator::open_order`. The protocol is
/// assigned by the engine, never by the caller.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub company_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub technician_id: Option<Uuid>,
    pub title: String,
    pub items: Vec<OrderItemDraft>,
    pub labor_amount: Decimal,
    pub discount: Decimal,
    pub displacement_cost: Decimal,
    pub third_party_cost: Decimal,
    pub installment_count: u32,
    pub payment_method: PaymentMethod,
    pub first_due_date: Option<NaiveDate>,
}

impl OrderDraft {
    pub fn new(customer_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            company_id: None,
            customer_id,
            technician_id: None,
            title: title.into(),
            items: Vec::new(),
            labor_amount: Decimal::ZERO,
            discount: Decimal::ZERO,
            displacement_cost: Decimal::ZERO,
            third_party_cost: Decimal::ZERO,
            installment_count: 1,
            payment_method: PaymentMethod::Pix,
            first_due_date: None,
        }
    }

    pub(crate) fn into_order(self, protocol: String, now: DateTime<Utc>) -> ServiceOrder {
        let order_id = Uuid::new_v4();
        let items = self
            .items
            .into_iter()
            .map(|d| OrderItem {
                id: Uuid::new_v4(),
                order_id,
                item_id: d.item_id,
                quantity: d.quantity,
                unit_price: d.unit_price,
            })
            .collect();
        ServiceOrder {
            id: order_id,
            company_id: self.company_id,
            customer_id: self.customer_id,
            technician_id: self.technician_id,
            protocol,
            title: self.title,
            status: OrderStatus::Open,
            items,
            labor_amount: self.labor_amount,
            discount: self.discount,
            displacement_cost: self.displacement_cost,
            third_party_cost: self.third_party_cost,
            installment_count: self.installment_count,
            payment_method: self.payment_method,
            first_due_date: self.first_due_date,
            opened_at: now,
            closed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
