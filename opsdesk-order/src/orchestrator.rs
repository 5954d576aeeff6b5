use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use opsdesk_core::Operator;
use opsdesk_ledger::{
    Category, EntryDirection, FinancialEntry, FinancialLedger, InstallmentSpec, PaymentMethod,
    PeriodLock,
};
use opsdesk_stock::{MovementDirection, MovementRequest, StockLedger, StockMovement};

use crate::order::{OrderDraft, ServiceOrder};
use crate::protocol::SequenceAssigner;
use crate::session::SessionFactory;
use crate::OrderError;

/// Input for the explicit direct-sale flow.
#[derive(Debug, Clone)]
pub struct SaleRequest {
    pub company_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub installment_count: u32,
    pub payment_method: PaymentMethod,
    pub first_due_date: Option<NaiveDate>,
}

/// What a completed sale produced: the OUT movement and the revenue rows.
#[derive(Debug, Clone)]
pub struct SaleReceipt {
    pub movement: StockMovement,
    pub entries: Vec<FinancialEntry>,
}

/// Input for the explicit supplier-delivery flow.
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub company_id: Option<Uuid>,
    pub supplier_id: Uuid,
    pub item_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub installment_count: u32,
    pub payment_method: PaymentMethod,
    pub first_due_date: Option<NaiveDate>,
}

/// What a completed purchase produced: the IN movement and the payable rows.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub movement: StockMovement,
    pub entries: Vec<FinancialEntry>,
}

/// Line totals are quantity x unit price; both carry two decimals, so the
/// raw product can carry four. Quantize before splitting so every stored
/// amount fits the 2-dp money scale.
fn money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// The saga that closes billable work.
///
/// Receives its collaborators at construction time and owns every
/// transaction boundary: one session per exposed operation, committed once
/// at the end, dropped (rolled back) on any failure. Nothing in the engine
/// reacts implicitly to another component's persistence; every financial or
/// stock effect of a business event is wired here, explicitly.
pub struct FulfillmentOrchestrator {
    sessions: Arc<dyn SessionFactory>,
    stock: StockLedger,
    ledger: FinancialLedger,
    assigner: SequenceAssigner,
}

impl FulfillmentOrchestrator {
    pub fn new(sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            sessions,
            stock: StockLedger::new(),
            ledger: FinancialLedger::new(),
            assigner: SequenceAssigner::new(),
        }
    }

    /// Create an order, assigning its protocol in the same transaction that
    /// inserts it.
    pub async fn open_order(
        &self,
        draft: OrderDraft,
        _operator: &Operator,
    ) -> Result<ServiceOrder, OrderError> {
        let now = Utc::now();
        let mut session = self.sessions.begin().await?;

        let protocol = self
            .assigner
            .next_protocol(session.orders(), now.date_naive())
            .await?;
        let order = draft.into_order(protocol, now);
        session.orders().insert_order(&order).await?;
        session.commit().await?;

        tracing::info!(order = %order.id, protocol = %order.protocol, "order opened");
        Ok(order)
    }

    /// Close a unit of billable work.
    ///
    /// Deducts every consumed line item, records the revenue and declared
    /// cost entries, and moves the order to FINALIZED, all in one
    /// failure-atomic unit. A later step failing (insufficient stock on the
    /// third item, a closed period) rolls back deductions already applied in
    /// the same call.
    pub async fn finalize(
        &self,
        order_id: Uuid,
        operator: &Operator,
    ) -> Result<ServiceOrder, OrderError> {
        let now = Utc::now();
        let mut session = self.sessions.begin().await?;

        let mut order = session
            .orders()
            .lock_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;
        if order.status.is_terminal() {
            return Err(OrderError::AlreadyFinalized {
                protocol: order.protocol.clone(),
            });
        }

        // Stock first: each line item locks and deducts its own row, so
        // concurrent finalizes over different products do not block each
        // other.
        for item in &order.items {
            let mut request = MovementRequest::new(
                item.item_id,
                MovementDirection::Out,
                item.quantity,
                item.unit_price,
            );
            request.company_id = order.company_id;
            request.customer_id = Some(order.customer_id);
            request.note = Some(format!("Order #{} consumption", order.protocol));
            self.stock
                .apply_movement(session.stock(), request, operator)
                .await?;
        }

        let billable = order.billable_total();
        if billable > Decimal::ZERO {
            let spec = InstallmentSpec {
                company_id: order.company_id,
                customer_id: Some(order.customer_id),
                technician_id: order.technician_id,
                supplier_id: None,
                description: format!("Service revenue - #{} {}", order.protocol, order.title),
                total: billable,
                direction: EntryDirection::In,
                category: Category::Service,
                payment_method: order.payment_method,
                count: order.installment_count,
                due_start: order.first_due_date.unwrap_or_else(|| now.date_naive()),
            };
            self.ledger
                .record_installments(session.ledger(), spec)
                .await?;
        }

        if order.displacement_cost > Decimal::ZERO {
            let mut entry = FinancialEntry::new(
                format!("Displacement cost - #{}", order.protocol),
                order.displacement_cost,
                EntryDirection::Out,
                Category::Cost,
                now.date_naive(),
            );
            entry.company_id = order.company_id;
            entry.customer_id = Some(order.customer_id);
            entry.technician_id = order.technician_id;
            self.ledger.record(session.ledger(), entry).await?;
        }

        if order.third_party_cost > Decimal::ZERO {
            let mut entry = FinancialEntry::new(
                format!("Third-party services - #{}", order.protocol),
                order.third_party_cost,
                EntryDirection::Out,
                Category::Cost,
                now.date_naive(),
            );
            entry.company_id = order.company_id;
            entry.customer_id = Some(order.customer_id);
            self.ledger.record(session.ledger(), entry).await?;
        }

        order.mark_finalized(now);
        session.orders().update_order(&order).await?;
        session.commit().await?;

        tracing::info!(
            order = %order.id,
            protocol = %order.protocol,
            billable = %billable,
            items = order.items.len(),
            "order finalized"
        );
        Ok(order)
    }

    /// Direct hardware sale: one OUT movement plus the revenue installment
    /// group, in one transaction. The historical system produced these
    /// entries as a save-hook side effect of the movement; here the coupling
    /// is explicit and lives only in this method.
    pub async fn process_sale(
        &self,
        sale: SaleRequest,
        operator: &Operator,
    ) -> Result<SaleReceipt, OrderError> {
        let now = Utc::now();
        let mut session = self.sessions.begin().await?;

        // Locks the row; the ledger's own lock_item inside apply_movement
        // re-acquires it within the same transaction.
        let item = session.stock().lock_item(sale.item_id).await.map_err(|e| {
            OrderError::Stock(match e {
                opsdesk_core::StorageError::NotFound(_) => {
                    opsdesk_stock::StockError::ItemNotFound(sale.item_id)
                }
                other => opsdesk_stock::StockError::Storage(other),
            })
        })?;

        let mut request = MovementRequest::new(
            sale.item_id,
            MovementDirection::Out,
            sale.quantity,
            sale.unit_price,
        );
        request.company_id = sale.company_id;
        request.customer_id = Some(sale.customer_id);
        request.note = Some(format!("Sale of {}", item.name));
        let movement = self
            .stock
            .apply_movement(session.stock(), request, operator)
            .await?;

        let total = money(sale.quantity * sale.unit_price);
        let spec = InstallmentSpec {
            company_id: sale.company_id,
            customer_id: Some(sale.customer_id),
            technician_id: None,
            supplier_id: None,
            description: format!("Hardware sale - {}", item.name),
            total,
            direction: EntryDirection::In,
            category: Category::Sale,
            payment_method: sale.payment_method,
            count: sale.installment_count,
            due_start: sale.first_due_date.unwrap_or_else(|| now.date_naive()),
        };
        let entries = self
            .ledger
            .record_installments(session.ledger(), spec)
            .await?;

        session.commit().await?;

        tracing::info!(item = %item.name, total = %total, "sale processed");
        Ok(SaleReceipt { movement, entries })
    }

    /// Supplier delivery: one IN movement plus the payable installment
    /// group owed to the supplier, in one transaction. The sale flow's
    /// mirror image.
    pub async fn process_purchase(
        &self,
        purchase: PurchaseRequest,
        operator: &Operator,
    ) -> Result<PurchaseReceipt, OrderError> {
        let now = Utc::now();
        let mut session = self.sessions.begin().await?;

        let item = session
            .stock()
            .lock_item(purchase.item_id)
            .await
            .map_err(|e| {
                OrderError::Stock(match e {
                    opsdesk_core::StorageError::NotFound(_) => {
                        opsdesk_stock::StockError::ItemNotFound(purchase.item_id)
                    }
                    other => opsdesk_stock::StockError::Storage(other),
                })
            })?;

        let mut request = MovementRequest::new(
            purchase.item_id,
            MovementDirection::In,
            purchase.quantity,
            purchase.unit_price,
        );
        request.company_id = purchase.company_id;
        request.supplier_id = Some(purchase.supplier_id);
        request.note = Some(format!("Purchase of {}", item.name));
        let movement = self
            .stock
            .apply_movement(session.stock(), request, operator)
            .await?;

        let total = money(purchase.quantity * purchase.unit_price);
        let spec = InstallmentSpec {
            company_id: purchase.company_id,
            customer_id: None,
            technician_id: None,
            supplier_id: Some(purchase.supplier_id),
            description: format!("Stock purchase - {}", item.name),
            total,
            direction: EntryDirection::Out,
            category: Category::Purchase,
            payment_method: purchase.payment_method,
            count: purchase.installment_count,
            due_start: purchase.first_due_date.unwrap_or_else(|| now.date_naive()),
        };
        let entries = self
            .ledger
            .record_installments(session.ledger(), spec)
            .await?;

        session.commit().await?;

        tracing::info!(item = %item.name, total = %total, "purchase processed");
        Ok(PurchaseReceipt { movement, entries })
    }

    /// Apply a standalone stock movement (manual adjustment, intake with no
    /// financial counterpart) in its own transaction.
    pub async fn apply_movement(
        &self,
        request: MovementRequest,
        operator: &Operator,
    ) -> Result<StockMovement, OrderError> {
        let mut session = self.sessions.begin().await?;
        let movement = self
            .stock
            .apply_movement(session.stock(), request, operator)
            .await?;
        session.commit().await?;
        Ok(movement)
    }

    /// Record a single financial entry in its own transaction.
    pub async fn record_entry(
        &self,
        entry: FinancialEntry,
        _operator: &Operator,
    ) -> Result<FinancialEntry, OrderError> {
        let mut session = self.sessions.begin().await?;
        let entry = self.ledger.record(session.ledger(), entry).await?;
        session.commit().await?;
        Ok(entry)
    }

    /// Record an installment group in its own (single) transaction.
    pub async fn record_installments(
        &self,
        spec: InstallmentSpec,
        _operator: &Operator,
    ) -> Result<Vec<FinancialEntry>, OrderError> {
        let mut session = self.sessions.begin().await?;
        let entries = self
            .ledger
            .record_installments(session.ledger(), spec)
            .await?;
        session.commit().await?;
        Ok(entries)
    }

    /// Mark an entry paid.
    pub async fn settle_entry(
        &self,
        entry_id: Uuid,
        paid_date: NaiveDate,
        method: PaymentMethod,
        receipt_ref: Option<String>,
    ) -> Result<FinancialEntry, OrderError> {
        let mut session = self.sessions.begin().await?;
        let entry = self
            .ledger
            .settle(session.ledger(), entry_id, paid_date, method, receipt_ref)
            .await?;
        session.commit().await?;
        Ok(entry)
    }

    /// Close a financial period for a company.
    pub async fn close_period(
        &self,
        company_id: Option<Uuid>,
        year: i32,
        month: u32,
        operator: &Operator,
    ) -> Result<PeriodLock, OrderError> {
        let mut session = self.sessions.begin().await?;
        let lock = self
            .ledger
            .close_period(session.ledger(), company_id, year, month, operator)
            .await?;
        session.commit().await?;
        Ok(lock)
    }
}
