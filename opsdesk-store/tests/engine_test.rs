use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use opsdesk_core::Operator;
use opsdesk_ledger::{
    Category, EntryDirection, EntryStatus, FinancialEntry, InstallmentSpec, LedgerError,
    PaymentMethod,
};
use opsdesk_order::{
    FulfillmentOrchestrator, OrderDraft, OrderError, OrderItemDraft, OrderStatus, PurchaseRequest,
    SaleRequest,
};
use opsdesk_stock::{MovementDirection, MovementRequest, StockError, StockItem};
use opsdesk_store::MemoryStore;

fn setup() -> (MemoryStore, FulfillmentOrchestrator, Operator) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("opsdesk=debug")
        .with_test_writer()
        .try_init();

    let store = MemoryStore::new();
    let engine = FulfillmentOrchestrator::new(Arc::new(store.clone()));
    let operator = Operator::new(Uuid::new_v4(), "tester");
    (store, engine, operator)
}

/// Seed a catalogue item and bring its balance up via an IN movement.
async fn seed_stock(
    store: &MemoryStore,
    engine: &FulfillmentOrchestrator,
    operator: &Operator,
    name: &str,
    quantity: rust_decimal::Decimal,
) -> Uuid {
    let item = StockItem::new(name, dec!(2), dec!(300.00));
    let id = item.id;
    store.seed_item(item).await;

    if quantity > rust_decimal::Decimal::ZERO {
        let request = MovementRequest::new(id, MovementDirection::In, quantity, dec!(200.00));
        engine.apply_movement(request, operator).await.unwrap();
    }
    id
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn finalize_deducts_stock_and_splits_revenue() {
    let (store, engine, operator) = setup();
    let item_id = seed_stock(&store, &engine, &operator, "SSD 480GB", dec!(10)).await;

    let mut draft = OrderDraft::new(Uuid::new_v4(), "Workstation upgrade");
    draft.items.push(OrderItemDraft {
        item_id,
        quantity: dec!(3),
        unit_price: dec!(250.00),
    });
    draft.labor_amount = dec!(150.00);
    draft.installment_count = 3;
    draft.first_due_date = Some(date(2027, 2, 10));
    let order = engine.open_order(draft, &operator).await.unwrap();

    let finalized = engine.finalize(order.id, &operator).await.unwrap();
    assert_eq!(finalized.status, OrderStatus::Finalized);
    assert!(finalized.closed_at.is_some());

    assert_eq!(store.item(item_id).await.unwrap().quantity, dec!(7));

    // 900.00 over three months starting at the declared first due date.
    let mut entries = store.entries().await;
    entries.sort_by_key(|e| e.due_date);
    assert_eq!(entries.len(), 3);
    for (i, e) in entries.iter().enumerate() {
        assert_eq!(e.amount, dec!(300.00));
        assert_eq!(e.direction, EntryDirection::In);
        assert_eq!(e.category, Category::Service);
        assert_eq!(e.installment_number, i as u32 + 1);
        assert_eq!(e.installment_count, 3);
    }
    assert_eq!(entries[0].due_date, date(2027, 2, 10));
    assert_eq!(entries[1].due_date, date(2027, 3, 10));
    assert_eq!(entries[2].due_date, date(2027, 4, 10));

    let group = entries[0].installment_group.unwrap();
    assert!(entries.iter().all(|e| e.installment_group == Some(group)));
}

#[tokio::test]
async fn finalize_records_declared_cost_entries() {
    let (store, engine, operator) = setup();

    let mut draft = OrderDraft::new(Uuid::new_v4(), "On-site visit");
    draft.labor_amount = dec!(200.00);
    draft.displacement_cost = dec!(45.00);
    draft.third_party_cost = dec!(80.00);
    draft.first_due_date = Some(date(2027, 6, 1));
    let order = engine.open_order(draft, &operator).await.unwrap();

    engine.finalize(order.id, &operator).await.unwrap();

    let entries = store.entries().await;
    assert_eq!(entries.len(), 3);

    let costs: Vec<_> = entries
        .iter()
        .filter(|e| e.direction == EntryDirection::Out)
        .collect();
    assert_eq!(costs.len(), 2);
    assert!(costs.iter().all(|e| e.category == Category::Cost));
    assert!(costs.iter().any(|e| e.amount == dec!(45.00)));
    assert!(costs.iter().any(|e| e.amount == dec!(80.00)));
}

#[tokio::test]
async fn finalize_failure_rolls_back_earlier_deductions() {
    let (store, engine, operator) = setup();
    let plentiful = seed_stock(&store, &engine, &operator, "Patch cable", dec!(50)).await;
    let scarce = seed_stock(&store, &engine, &operator, "Rack switch", dec!(1)).await;

    let mut draft = OrderDraft::new(Uuid::new_v4(), "Network buildout");
    draft.items.push(OrderItemDraft {
        item_id: plentiful,
        quantity: dec!(10),
        unit_price: dec!(15.00),
    });
    draft.items.push(OrderItemDraft {
        item_id: scarce,
        quantity: dec!(2),
        unit_price: dec!(1200.00),
    });
    let order = engine.open_order(draft, &operator).await.unwrap();

    let err = engine.finalize(order.id, &operator).await.unwrap_err();
    assert!(matches!(
        err,
        OrderError::Stock(StockError::InsufficientStock { .. })
    ));

    // The first item's deduction must not survive the failed second one.
    assert_eq!(store.item(plentiful).await.unwrap().quantity, dec!(50));
    assert_eq!(store.item(scarce).await.unwrap().quantity, dec!(1));
    assert!(store.entries().await.is_empty());
    assert_eq!(
        store.order(order.id).await.unwrap().status,
        OrderStatus::Open
    );
}

#[tokio::test]
async fn finalize_is_rejected_on_terminal_orders() {
    let (store, engine, operator) = setup();
    let item_id = seed_stock(&store, &engine, &operator, "HDD 1TB", dec!(4)).await;

    let mut draft = OrderDraft::new(Uuid::new_v4(), "Disk swap");
    draft.items.push(OrderItemDraft {
        item_id,
        quantity: dec!(1),
        unit_price: dec!(300.00),
    });
    let order = engine.open_order(draft, &operator).await.unwrap();

    engine.finalize(order.id, &operator).await.unwrap();
    let err = engine.finalize(order.id, &operator).await.unwrap_err();
    assert!(matches!(err, OrderError::AlreadyFinalized { .. }));

    // The second call must not deduct again.
    assert_eq!(store.item(item_id).await.unwrap().quantity, dec!(3));
    assert_eq!(store.entries().await.len(), 1);
}

#[tokio::test]
async fn protocols_increment_within_the_day() {
    let (_store, engine, operator) = setup();

    let first = engine
        .open_order(OrderDraft::new(Uuid::new_v4(), "First"), &operator)
        .await
        .unwrap();
    let second = engine
        .open_order(OrderDraft::new(Uuid::new_v4(), "Second"), &operator)
        .await
        .unwrap();

    let prefix = Utc::now().date_naive().format("%Y%m%d").to_string();
    assert_eq!(first.protocol, format!("{prefix}001"));
    assert_eq!(second.protocol, format!("{prefix}002"));
}

#[tokio::test]
async fn closed_period_blocks_writes_for_that_company_only() {
    let (_store, engine, operator) = setup();
    let company_a = Some(Uuid::new_v4());
    let company_b = Some(Uuid::new_v4());

    engine
        .close_period(company_a, 2027, 3, &operator)
        .await
        .unwrap();

    let mut blocked = FinancialEntry::new(
        "March contract",
        dec!(500.00),
        EntryDirection::In,
        Category::Contract,
        date(2027, 3, 15),
    );
    blocked.company_id = company_a;
    let err = engine.record_entry(blocked, &operator).await.unwrap_err();
    assert!(matches!(
        err,
        OrderError::Ledger(LedgerError::PeriodClosed { year: 2027, month: 3 })
    ));

    // Same month, different company: unaffected.
    let mut allowed = FinancialEntry::new(
        "March contract",
        dec!(500.00),
        EntryDirection::In,
        Category::Contract,
        date(2027, 3, 15),
    );
    allowed.company_id = company_b;
    engine.record_entry(allowed, &operator).await.unwrap();

    // Adjacent month for the locked company: unaffected.
    let mut next_month = FinancialEntry::new(
        "April contract",
        dec!(500.00),
        EntryDirection::In,
        Category::Contract,
        date(2027, 4, 15),
    );
    next_month.company_id = company_a;
    engine.record_entry(next_month, &operator).await.unwrap();
}

#[tokio::test]
async fn closing_a_period_twice_is_rejected() {
    let (_store, engine, operator) = setup();
    let company = Some(Uuid::new_v4());

    engine
        .close_period(company, 2027, 5, &operator)
        .await
        .unwrap();
    let err = engine
        .close_period(company, 2027, 5, &operator)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::Ledger(LedgerError::AlreadyClosed { year: 2027, month: 5 })
    ));
}

#[tokio::test]
async fn finalize_against_a_closed_month_leaves_no_trace() {
    let (store, engine, operator) = setup();
    let item_id = seed_stock(&store, &engine, &operator, "NVR unit", dec!(5)).await;

    let mut draft = OrderDraft::new(Uuid::new_v4(), "CCTV install");
    draft.items.push(OrderItemDraft {
        item_id,
        quantity: dec!(1),
        unit_price: dec!(900.00),
    });
    let order = engine.open_order(draft, &operator).await.unwrap();

    // No first_due_date on the draft, so revenue lands in the current month.
    let today = Utc::now().date_naive();
    engine
        .close_period(None, today.year(), today.month(), &operator)
        .await
        .unwrap();

    let err = engine.finalize(order.id, &operator).await.unwrap_err();
    assert!(matches!(
        err,
        OrderError::Ledger(LedgerError::PeriodClosed { .. })
    ));

    // The stock deduction applied before the guard fired must be undone.
    assert_eq!(store.item(item_id).await.unwrap().quantity, dec!(5));
    assert_eq!(
        store.order(order.id).await.unwrap().status,
        OrderStatus::Open
    );
}

#[tokio::test]
async fn process_sale_moves_stock_and_bills_in_installments() {
    let (store, engine, operator) = setup();
    let item_id = seed_stock(&store, &engine, &operator, "Access point", dec!(5)).await;

    let receipt = engine
        .process_sale(
            SaleRequest {
                company_id: None,
                customer_id: Uuid::new_v4(),
                item_id,
                quantity: dec!(2),
                unit_price: dec!(100.00),
                installment_count: 2,
                payment_method: PaymentMethod::Boleto,
                first_due_date: Some(date(2027, 8, 5)),
            },
            &operator,
        )
        .await
        .unwrap();

    assert_eq!(receipt.movement.direction, MovementDirection::Out);
    assert_eq!(store.item(item_id).await.unwrap().quantity, dec!(3));

    assert_eq!(receipt.entries.len(), 2);
    assert!(receipt.entries.iter().all(|e| e.amount == dec!(100.00)));
    assert!(receipt.entries.iter().all(|e| e.category == Category::Sale));
    assert!(receipt
        .entries
        .iter()
        .all(|e| e.payment_method == PaymentMethod::Boleto));
}

#[tokio::test]
async fn process_purchase_adds_stock_and_records_payables() {
    let (store, engine, operator) = setup();
    let item_id = seed_stock(&store, &engine, &operator, "PoE switch", dec!(1)).await;
    let supplier_id = Uuid::new_v4();

    let receipt = engine
        .process_purchase(
            PurchaseRequest {
                company_id: None,
                supplier_id,
                item_id,
                quantity: dec!(4),
                unit_price: dec!(150.00),
                installment_count: 3,
                payment_method: PaymentMethod::Boleto,
                first_due_date: Some(date(2027, 10, 5)),
            },
            &operator,
        )
        .await
        .unwrap();

    assert_eq!(receipt.movement.direction, MovementDirection::In);
    assert_eq!(receipt.movement.supplier_id, Some(supplier_id));
    assert_eq!(store.item(item_id).await.unwrap().quantity, dec!(5));

    assert_eq!(receipt.entries.len(), 3);
    assert!(receipt.entries.iter().all(|e| e.amount == dec!(200.00)));
    assert!(receipt
        .entries
        .iter()
        .all(|e| e.direction == EntryDirection::Out));
    assert!(receipt
        .entries
        .iter()
        .all(|e| e.category == Category::Purchase));
    assert!(receipt
        .entries
        .iter()
        .all(|e| e.supplier_id == Some(supplier_id)));
    assert_eq!(receipt.entries[0].due_date, date(2027, 10, 5));
    assert_eq!(receipt.entries[2].due_date, date(2027, 12, 5));
}

#[tokio::test]
async fn fractional_quantities_bill_at_two_decimal_places() {
    let (store, engine, operator) = setup();
    let item_id = seed_stock(&store, &engine, &operator, "Cat6 cable (m)", dec!(100)).await;

    // 1.5 x 33.33 = 49.995 raw; billed as 50.00, never a 4-dp amount.
    let receipt = engine
        .process_sale(
            SaleRequest {
                company_id: None,
                customer_id: Uuid::new_v4(),
                item_id,
                quantity: dec!(1.5),
                unit_price: dec!(33.33),
                installment_count: 3,
                payment_method: PaymentMethod::Pix,
                first_due_date: Some(date(2027, 4, 1)),
            },
            &operator,
        )
        .await
        .unwrap();

    let sum: rust_decimal::Decimal = receipt.entries.iter().map(|e| e.amount).sum();
    assert_eq!(sum, dec!(50.00));
    assert!(receipt.entries.iter().all(|e| e.amount.scale() <= 2));
    assert_eq!(receipt.entries[0].amount, dec!(16.67));
    assert_eq!(receipt.entries[2].amount, dec!(16.66));

    assert_eq!(store.item(item_id).await.unwrap().quantity, dec!(98.5));
}

#[tokio::test]
async fn settling_freezes_status_and_rejects_a_second_payment() {
    let (store, engine, operator) = setup();

    // Due in the past, so it is recorded as OVERDUE.
    let entry = FinancialEntry::new(
        "Old invoice",
        dec!(120.00),
        EntryDirection::In,
        Category::Service,
        date(2026, 1, 10),
    );
    let recorded = engine.record_entry(entry, &operator).await.unwrap();
    assert_eq!(recorded.status, EntryStatus::Overdue);

    let settled = engine
        .settle_entry(
            recorded.id,
            date(2026, 8, 30),
            PaymentMethod::Pix,
            Some("receipt-0042".into()),
        )
        .await
        .unwrap();
    assert_eq!(settled.status, EntryStatus::Paid);
    assert_eq!(settled.paid_date, Some(date(2026, 8, 30)));
    assert_eq!(settled.receipt_ref.as_deref(), Some("receipt-0042"));

    let stored = store
        .entries()
        .await
        .into_iter()
        .find(|e| e.id == recorded.id)
        .unwrap();
    assert_eq!(stored.status, EntryStatus::Paid);

    let err = engine
        .settle_entry(recorded.id, date(2026, 8, 31), PaymentMethod::Pix, None)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Ledger(LedgerError::AlreadyPaid(_))));
}

#[tokio::test]
async fn installment_batch_fails_whole_when_a_later_month_is_closed() {
    let (store, engine, operator) = setup();
    let company = Some(Uuid::new_v4());

    // Lock the month the third installment would land in.
    engine
        .close_period(company, 2027, 11, &operator)
        .await
        .unwrap();

    let spec = InstallmentSpec {
        company_id: company,
        customer_id: Some(Uuid::new_v4()),
        technician_id: None,
        supplier_id: None,
        description: "Managed services".into(),
        total: dec!(900.00),
        direction: EntryDirection::In,
        category: Category::Contract,
        payment_method: PaymentMethod::Boleto,
        count: 3,
        due_start: date(2027, 9, 15),
    };
    let err = engine
        .record_installments(spec, &operator)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::Ledger(LedgerError::PeriodClosed { year: 2027, month: 11 })
    ));

    // No partial group.
    assert!(store.entries().await.is_empty());
}

#[tokio::test]
async fn uneven_totals_put_the_remainder_on_the_last_installment() {
    let (_store, engine, operator) = setup();

    let spec = InstallmentSpec {
        company_id: None,
        customer_id: Some(Uuid::new_v4()),
        technician_id: None,
        supplier_id: None,
        description: "License renewal".into(),
        total: dec!(100.00),
        direction: EntryDirection::In,
        category: Category::Other,
        payment_method: PaymentMethod::Credit,
        count: 3,
        due_start: date(2027, 1, 31),
    };
    let entries = engine.record_installments(spec, &operator).await.unwrap();

    assert_eq!(entries[0].amount, dec!(33.33));
    assert_eq!(entries[1].amount, dec!(33.33));
    assert_eq!(entries[2].amount, dec!(33.34));

    // End-of-month start dates clamp instead of overflowing.
    assert_eq!(entries[0].due_date, date(2027, 1, 31));
    assert_eq!(entries[1].due_date, date(2027, 2, 28));
    assert_eq!(entries[2].due_date, date(2027, 3, 31));

    assert!(entries
        .iter()
        .all(|e| e.description.starts_with("License renewal (")));
}

#[tokio::test]
async fn movements_below_minimum_still_apply() {
    let (store, engine, operator) = setup();
    let item_id = seed_stock(&store, &engine, &operator, "Toner", dec!(3)).await;

    // minimum_quantity is 2; dropping to 1 warns but succeeds.
    let request = MovementRequest::new(item_id, MovementDirection::Out, dec!(2), dec!(90.00));
    engine.apply_movement(request, &operator).await.unwrap();

    assert_eq!(store.item(item_id).await.unwrap().quantity, dec!(1));
    assert_eq!(store.movements_for(item_id).await.len(), 2);
}
