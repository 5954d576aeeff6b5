use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of the money movement: IN is money owed to us, OUT is money we
/// owe. Single-leg records per counterparty, not double-entry bookkeeping.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryDirection {
    In,
    Out,
}

impl EntryDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryDirection::In => "IN",
            EntryDirection::Out => "OUT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "IN" => Some(EntryDirection::In),
            "OUT" => Some(EntryDirection::Out),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "PENDING",
            EntryStatus::Paid => "PAID",
            EntryStatus::Overdue => "OVERDUE",
            EntryStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(EntryStatus::Pending),
            "PAID" => Some(EntryStatus::Paid),
            "OVERDUE" => Some(EntryStatus::Overdue),
            "CANCELLED" => Some(EntryStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Monthly contract billing.
    Contract,
    /// Hardware sale.
    Sale,
    /// One-off service revenue.
    Service,
    /// Operating cost (displacement, third-party labor).
    Cost,
    /// Stock purchase.
    Purchase,
    Payroll,
    Tax,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Contract => "CONTRACT",
            Category::Sale => "SALE",
            Category::Service => "SERVICE",
            Category::Cost => "COST",
            Category::Purchase => "PURCHASE",
            Category::Payroll => "PAYROLL",
            Category::Tax => "TAX",
            Category::Other => "OTHER",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CONTRACT" => Some(Category::Contract),
            "SALE" => Some(Category::Sale),
            "SERVICE" => Some(Category::Service),
            "COST" => Some(Category::Cost),
            "PURCHASE" => Some(Category::Purchase),
            "PAYROLL" => Some(Category::Payroll),
            "TAX" => Some(Category::Tax),
            "OTHER" => Some(Category::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Boleto,
    Credit,
    Debit,
    Pix,
    Cash,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Boleto => "BOLETO",
            PaymentMethod::Credit => "CREDIT",
            PaymentMethod::Debit => "DEBIT",
            PaymentMethod::Pix => "PIX",
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Transfer => "TRANSFER",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "BOLETO" => Some(PaymentMethod::Boleto),
            "CREDIT" => Some(PaymentMethod::Credit),
            "DEBIT" => Some(PaymentMethod::Debit),
            "PIX" => Some(PaymentMethod::Pix),
            "CASH" => Some(PaymentMethod::Cash),
            "TRANSFER" => Some(PaymentMethod::Transfer),
            _ => None,
        }
    }
}

/// One money-movement record against a counterparty.
///
/// Status is recomputed on every persist; only PAID freezes it. Amount and
/// due date are immutable once paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialEntry {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub technician_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub description: String,
    pub amount: Decimal,
    pub direction: EntryDirection,
    pub category: Category,
    pub status: EntryStatus,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub payment_method: PaymentMethod,
    /// 1-based position inside the installment group.
    pub installment_number: u32,
    pub installment_count: u32,
    /// Shared id linking every entry produced by one split.
    pub installment_group: Option<Uuid>,
    /// External reference to a stored receipt/comprovante; the bytes live in
    /// the file store, not here.
    pub receipt_ref: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FinancialEntry {
    pub fn new(
        description: impl Into<String>,
        amount: Decimal,
        direction: EntryDirection,
        category: Category,
        due_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            company_id: None,
            customer_id: None,
            technician_id: None,
            supplier_id: None,
            description: description.into(),
            amount,
            direction,
            category,
            status: EntryStatus::Pending,
            due_date,
            paid_date: None,
            payment_method: PaymentMethod::Cash,
            installment_number: 1,
            installment_count: 1,
            installment_group: None,
            receipt_ref: None,
            note: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Recompute the lifecycle status against `today`. PAID is final; every
    /// other status collapses back to OVERDUE/PENDING, which is why marking
    /// an entry paid is the only way to freeze it.
    pub fn refresh_status(&mut self, today: NaiveDate) {
        if self.status == EntryStatus::Paid {
            return;
        }
        self.status = if self.due_date < today {
            EntryStatus::Overdue
        } else {
            EntryStatus::Pending
        };
    }

    pub fn is_paid(&self) -> bool {
        self.status == EntryStatus::Paid
    }
}
