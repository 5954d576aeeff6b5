use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use opsdesk_core::StorageError;
use opsdesk_ledger::{FinancialEntry, LedgerStore, PeriodLock};
use opsdesk_order::{FulfillmentSession, OrderStore, ServiceOrder, SessionFactory};
use opsdesk_stock::{StockItem, StockMovement, StockStore};

#[derive(Debug, Default, Clone)]
struct State {
    items: HashMap<Uuid, StockItem>,
    movements: Vec<StockMovement>,
    entries: HashMap<Uuid, FinancialEntry>,
    period_locks: Vec<PeriodLock>,
    orders: HashMap<Uuid, ServiceOrder>,
}

/// In-memory store for tests and local runs.
///
/// A session owns the whole-store mutex for its lifetime and mutates a
/// working copy; commit swaps the copy in, drop discards it. Coarser than
/// the row locks of the Postgres store, but it gives the same guarantees
/// the engine relies on: sessions serialize, and an uncommitted session
/// leaves no trace.
#[derive(Default, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a catalogue item in place. Balances still arrive via movements.
    pub async fn seed_item(&self, item: StockItem) {
        self.state.lock().await.items.insert(item.id, item);
    }

    pub async fn item(&self, id: Uuid) -> Option<StockItem> {
        self.state.lock().await.items.get(&id).cloned()
    }

    pub async fn movements_for(&self, item_id: Uuid) -> Vec<StockMovement> {
        self.state
            .lock()
            .await
            .movements
            .iter()
            .filter(|m| m.item_id == item_id)
            .cloned()
            .collect()
    }

    pub async fn entries(&self) -> Vec<FinancialEntry> {
        self.state.lock().await.entries.values().cloned().collect()
    }

    pub async fn order(&self, id: Uuid) -> Option<ServiceOrder> {
        self.state.lock().await.orders.get(&id).cloned()
    }
}

#[async_trait]
impl SessionFactory for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn FulfillmentSession>, StorageError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemorySession { guard, working }))
    }
}

pub struct MemorySession {
    guard: OwnedMutexGuard<State>,
    working: State,
}

#[async_trait]
impl StockStore for MemorySession {
    async fn lock_item(&mut self, item_id: Uuid) -> Result<StockItem, StorageError> {
        self.working
            .items
            .get(&item_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("stock item {item_id}")))
    }

    async fn save_item_quantity(
        &mut self,
        item_id: Uuid,
        quantity: Decimal,
    ) -> Result<(), StorageError> {
        let item = self
            .working
            .items
            .get_mut(&item_id)
            .ok_or_else(|| StorageError::NotFound(format!("stock item {item_id}")))?;
        item.quantity = quantity;
        item.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<(), StorageError> {
        self.working.movements.push(movement.clone());
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemorySession {
    async fn insert_entry(&mut self, entry: &FinancialEntry) -> Result<(), StorageError> {
        self.working.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn update_entry(&mut self, entry: &FinancialEntry) -> Result<(), StorageError> {
        if !self.working.entries.contains_key(&entry.id) {
            return Err(StorageError::NotFound(format!("entry {}", entry.id)));
        }
        self.working.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn get_entry(&mut self, id: Uuid) -> Result<Option<FinancialEntry>, StorageError> {
        Ok(self.working.entries.get(&id).cloned())
    }

    async fn period_lock_exists(
        &mut self,
        company_id: Option<Uuid>,
        year: i32,
        month: u32,
    ) -> Result<bool, StorageError> {
        Ok(self
            .working
            .period_locks
            .iter()
            .any(|l| l.company_id == company_id && l.year == year && l.month == month))
    }

    async fn insert_period_lock(&mut self, lock: &PeriodLock) -> Result<(), StorageError> {
        let exists = self
            .working
            .period_locks
            .iter()
            .any(|l| l.company_id == lock.company_id && l.year == lock.year && l.month == lock.month);
        if exists {
            return Err(StorageError::Duplicate(format!(
                "period lock {:02}/{}",
                lock.month, lock.year
            )));
        }
        self.working.period_locks.push(lock.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemorySession {
    async fn lock_order(&mut self, id: Uuid) -> Result<Option<ServiceOrder>, StorageError> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn insert_order(&mut self, order: &ServiceOrder) -> Result<(), StorageError> {
        let duplicate = self
            .working
            .orders
            .values()
            .any(|o| o.protocol == order.protocol);
        if duplicate {
            return Err(StorageError::Duplicate(format!(
                "protocol {}",
                order.protocol
            )));
        }
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order(&mut self, order: &ServiceOrder) -> Result<(), StorageError> {
        if !self.working.orders.contains_key(&order.id) {
            return Err(StorageError::NotFound(format!("order {}", order.id)));
        }
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn latest_protocol(&mut self, prefix: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .working
            .orders
            .values()
            .map(|o| o.protocol.as_str())
            .filter(|p| p.starts_with(prefix))
            .max()
            .map(str::to_string))
    }
}

#[async_trait]
impl FulfillmentSession for MemorySession {
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
        let MemorySession { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
