use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use opsdesk_core::StorageError;
use opsdesk_ledger::{
    Category, EntryDirection, EntryStatus, FinancialEntry, LedgerStore, PaymentMethod, PeriodLock,
};
use opsdesk_order::{
    FulfillmentSession, OrderItem, OrderStatus, OrderStore, ServiceOrder, SessionFactory,
};
use opsdesk_stock::{StockItem, StockMovement, StockStore};

use crate::app_config::DatabaseConfig;

/// PostgreSQL-backed store. One `PgSession` wraps one database transaction;
/// row locks come from `SELECT ... FOR UPDATE` inside that transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        tracing::info!("running database migrations");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        tracing::info!("migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SessionFactory for PgStore {
    async fn begin(&self) -> Result<Box<dyn FulfillmentSession>, StorageError> {
        let tx = self.pool.begin().await.map_err(map_sqlx)?;
        Ok(Box::new(PgSession { tx }))
    }
}

pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

fn map_sqlx(e: sqlx::Error) -> StorageError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return StorageError::Duplicate(db.message().to_string());
        }
    }
    StorageError::Backend(e.to_string())
}

fn bad_column(column: &str, value: &str) -> StorageError {
    StorageError::Backend(format!("unexpected value '{value}' in column {column}"))
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    name: String,
    minimum_quantity: Decimal,
    suggested_unit_price: Decimal,
    quantity: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ItemRow {
    fn into_item(self) -> StockItem {
        StockItem {
            id: self.id,
            name: self.name,
            minimum_quantity: self.minimum_quantity,
            suggested_unit_price: self.suggested_unit_price,
            quantity: self.quantity,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: Uuid,
    company_id: Option<Uuid>,
    customer_id: Option<Uuid>,
    technician_id: Option<Uuid>,
    supplier_id: Option<Uuid>,
    description: String,
    amount: Decimal,
    direction: String,
    category: String,
    status: String,
    due_date: NaiveDate,
    paid_date: Option<NaiveDate>,
    payment_method: String,
    installment_number: i32,
    installment_count: i32,
    installment_group: Option<Uuid>,
    receipt_ref: Option<String>,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EntryRow {
    fn into_entry(self) -> Result<FinancialEntry, StorageError> {
        Ok(FinancialEntry {
            id: self.id,
            company_id: self.company_id,
            customer_id: self.customer_id,
            technician_id: self.technician_id,
            supplier_id: self.supplier_id,
            description: self.description,
            amount: self.amount,
            direction: EntryDirection::from_str(&self.direction)
                .ok_or_else(|| bad_column("direction", &self.direction))?,
            category: Category::from_str(&self.category)
                .ok_or_else(|| bad_column("category", &self.category))?,
            status: EntryStatus::from_str(&self.status)
                .ok_or_else(|| bad_column("status", &self.status))?,
            due_date: self.due_date,
            paid_date: self.paid_date,
            payment_method: PaymentMethod::from_str(&self.payment_method)
                .ok_or_else(|| bad_column("payment_method", &self.payment_method))?,
            installment_number: self.installment_number as u32,
            installment_count: self.installment_count as u32,
            installment_group: self.installment_group,
            receipt_ref: self.receipt_ref,
            note: self.note,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    company_id: Option<Uuid>,
    customer_id: Uuid,
    technician_id: Option<Uuid>,
    protocol: String,
    title: String,
    status: String,
    labor_amount: Decimal,
    discount: Decimal,
    displacement_cost: Decimal,
    third_party_cost: Decimal,
    installment_count: i32,
    payment_method: String,
    first_due_date: Option<NaiveDate>,
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    item_id: Uuid,
    quantity: Decimal,
    unit_price: Decimal,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItemRow>) -> Result<ServiceOrder, StorageError> {
        Ok(ServiceOrder {
            id: self.id,
            company_id: self.company_id,
            customer_id: self.customer_id,
            technician_id: self.technician_id,
            protocol: self.protocol,
            title: self.title,
            status: OrderStatus::from_str(&self.status)
                .ok_or_else(|| bad_column("status", &self.status))?,
            items: items
                .into_iter()
                .map(|r| OrderItem {
                    id: r.id,
                    order_id: r.order_id,
                    item_id: r.item_id,
                    quantity: r.quantity,
                    unit_price: r.unit_price,
                })
                .collect(),
            labor_amount: self.labor_amount,
            discount: self.discount,
            displacement_cost: self.displacement_cost,
            third_party_cost: self.third_party_cost,
            installment_count: self.installment_count as u32,
            payment_method: PaymentMethod::from_str(&self.payment_method)
                .ok_or_else(|| bad_column("payment_method", &self.payment_method))?,
            first_due_date: self.first_due_date,
            opened_at: self.opened_at,
            closed_at: self.closed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl StockStore for PgSession {
    async fn lock_item(&mut self, item_id: Uuid) -> Result<StockItem, StorageError> {
        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, name, minimum_quantity, suggested_unit_price, quantity,
                   created_at, updated_at
            FROM stock_items
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(item_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?
        .ok_or_else(|| StorageError::NotFound(format!("stock item {item_id}")))?;

        Ok(row.into_item())
    }

    async fn save_item_quantity(
        &mut self,
        item_id: Uuid,
        quantity: Decimal,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            "UPDATE stock_items SET quantity = $2, updated_at = now() WHERE id = $1",
        )
        .bind(item_id)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("stock item {item_id}")));
        }
        Ok(())
    }

    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements
                (id, company_id, item_id, direction, quantity, unit_price,
                 customer_id, supplier_id, serial_number, note, operator_id, moved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(movement.id)
        .bind(movement.company_id)
        .bind(movement.item_id)
        .bind(movement.direction.as_str())
        .bind(movement.quantity)
        .bind(movement.unit_price)
        .bind(movement.customer_id)
        .bind(movement.supplier_id)
        .bind(&movement.serial_number)
        .bind(&movement.note)
        .bind(movement.operator_id)
        .bind(movement.moved_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgSession {
    async fn insert_entry(&mut self, entry: &FinancialEntry) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO financial_entries
                (id, company_id, customer_id, technician_id, supplier_id,
                 description, amount, direction, category, status,
                 due_date, paid_date, payment_method,
                 installment_number, installment_count, installment_group,
                 receipt_ref, note, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(entry.id)
        .bind(entry.company_id)
        .bind(entry.customer_id)
        .bind(entry.technician_id)
        .bind(entry.supplier_id)
        .bind(&entry.description)
        .bind(entry.amount)
        .bind(entry.direction.as_str())
        .bind(entry.category.as_str())
        .bind(entry.status.as_str())
        .bind(entry.due_date)
        .bind(entry.paid_date)
        .bind(entry.payment_method.as_str())
        .bind(entry.installment_number as i32)
        .bind(entry.installment_count as i32)
        .bind(entry.installment_group)
        .bind(&entry.receipt_ref)
        .bind(&entry.note)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn update_entry(&mut self, entry: &FinancialEntry) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE financial_entries
            SET status = $2, paid_date = $3, payment_method = $4,
                receipt_ref = $5, note = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(entry.id)
        .bind(entry.status.as_str())
        .bind(entry.paid_date)
        .bind(entry.payment_method.as_str())
        .bind(&entry.receipt_ref)
        .bind(&entry.note)
        .bind(entry.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("entry {}", entry.id)));
        }
        Ok(())
    }

    async fn get_entry(&mut self, id: Uuid) -> Result<Option<FinancialEntry>, StorageError> {
        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT id, company_id, customer_id, technician_id, supplier_id,
                   description, amount, direction, category, status,
                   due_date, paid_date, payment_method,
                   installment_number, installment_count, installment_group,
                   receipt_ref, note, created_at, updated_at
            FROM financial_entries
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;

        row.map(EntryRow::into_entry).transpose()
    }

    async fn period_lock_exists(
        &mut self,
        company_id: Option<Uuid>,
        year: i32,
        month: u32,
    ) -> Result<bool, StorageError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM period_locks
                WHERE company_id IS NOT DISTINCT FROM $1 AND year = $2 AND month = $3
            )
            "#,
        )
        .bind(company_id)
        .bind(year)
        .bind(month as i32)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(exists)
    }

    async fn insert_period_lock(&mut self, lock: &PeriodLock) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO period_locks (id, company_id, year, month, closed_by, closed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(lock.id)
        .bind(lock.company_id)
        .bind(lock.year)
        .bind(lock.month as i32)
        .bind(lock.closed_by)
        .bind(lock.closed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgSession {
    async fn lock_order(&mut self, id: Uuid) -> Result<Option<ServiceOrder>, StorageError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, company_id, customer_id, technician_id, protocol, title,
                   status, labor_amount, discount, displacement_cost,
                   third_party_cost, installment_count, payment_method,
                   first_due_date, opened_at, closed_at, created_at, updated_at
            FROM service_orders
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT id, order_id, item_id, quantity, unit_price
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;

        row.into_order(items).map(Some)
    }

    async fn insert_order(&mut self, order: &ServiceOrder) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO service_orders
                (id, company_id, customer_id, technician_id, protocol, title,
                 status, labor_amount, discount, displacement_cost,
                 third_party_cost, installment_count, payment_method,
                 first_due_date, opened_at, closed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(order.id)
        .bind(order.company_id)
        .bind(order.customer_id)
        .bind(order.technician_id)
        .bind(&order.protocol)
        .bind(&order.title)
        .bind(order.status.as_str())
        .bind(order.labor_amount)
        .bind(order.discount)
        .bind(order.displacement_cost)
        .bind(order.third_party_cost)
        .bind(order.installment_count as i32)
        .bind(order.payment_method.as_str())
        .bind(order.first_due_date)
        .bind(order.opened_at)
        .bind(order.closed_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;

        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, item_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.item_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        }
        Ok(())
    }

    async fn update_order(&mut self, order: &ServiceOrder) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE service_orders
            SET status = $2, labor_amount = $3, discount = $4,
                displacement_cost = $5, third_party_cost = $6,
                installment_count = $7, payment_method = $8,
                first_due_date = $9, closed_at = $10, updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.labor_amount)
        .bind(order.discount)
        .bind(order.displacement_cost)
        .bind(order.third_party_cost)
        .bind(order.installment_count as i32)
        .bind(order.payment_method.as_str())
        .bind(order.first_due_date)
        .bind(order.closed_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("order {}", order.id)));
        }
        Ok(())
    }

    async fn latest_protocol(&mut self, prefix: &str) -> Result<Option<String>, StorageError> {
        // FOR UPDATE serializes same-day creators on the scanned rows; the
        // UNIQUE constraint on protocol is the backstop for the first
        // creation of a day, where there is nothing to lock yet.
        sqlx::query_scalar(
            r#"
            SELECT protocol FROM service_orders
            WHERE protocol LIKE $1 || '%'
            ORDER BY protocol DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(prefix)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)
    }
}

#[async_trait]
impl FulfillmentSession for PgSession {
    fn stock(&mut self) -> &mut dyn StockStore {
        self
    }

    fn ledger(&mut self) -> &mut dyn LedgerStore {
        self
    }

    fn orders(&mut self) -> &mut dyn OrderStore {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.tx.commit().await.map_err(map_sqlx)
    }
}
