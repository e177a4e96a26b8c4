mod common;

use billing_engine::models::Invoice;
use billing_engine::store::{BillingUnitOfWork, InvoiceStore, MemberStore};
use chrono::Utc;
use common::*;
use service_core::error::AppError;

#[tokio::test]
async fn one_invoice_per_member_and_month() {
    let h = TestHarness::new();
    let basic = h.plan("Basic", 5000, true).await;
    let member = h.member(Some(basic.plan_id)).await;
    h.invoice(&member, &basic, month(2025, 3), date(2025, 3, 15))
        .await;

    let duplicate = Invoice::new(
        member.member_id,
        &basic,
        month(2025, 3),
        date(2025, 3, 20),
        Utc::now(),
    );
    let err = h.store.insert_invoice(&duplicate).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // The same constraint holds through the transactional path, and a
    // conflicting commit applies nothing.
    let mut mutated = member.clone();
    mutated.plan_id = None;
    let err = h
        .store
        .commit_billing_mutation(&mutated, None, Some(&duplicate))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    let member = h
        .store
        .member_by_id(member.member_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member.plan_id, Some(basic.plan_id));
}

#[tokio::test]
async fn same_month_different_members_is_allowed() {
    let h = TestHarness::new();
    let basic = h.plan("Basic", 5000, true).await;
    let a = h.member(Some(basic.plan_id)).await;
    let b = h.member(Some(basic.plan_id)).await;
    h.invoice(&a, &basic, month(2025, 3), date(2025, 3, 15)).await;
    h.invoice(&b, &basic, month(2025, 3), date(2025, 3, 15)).await;
    assert_eq!(h.store.invoice_count().await, 2);
}

#[tokio::test]
async fn processing_flags_never_flip_back() {
    let h = TestHarness::new();
    let basic = h.plan("Basic", 5000, true).await;
    let member = h.member(Some(basic.plan_id)).await;
    let mut invoice = h
        .invoice(&member, &basic, month(2025, 3), date(2025, 3, 15))
        .await;

    invoice.is_paid = true;
    invoice.delinquency_processed = true;
    invoice.next_invoice_generated = true;
    h.store.update_invoice(&invoice).await.unwrap();

    // A stale writer carrying false for the flags must not reset them.
    invoice.is_paid = false;
    invoice.delinquency_processed = false;
    invoice.next_invoice_generated = false;
    invoice.notes = Some("stale write".to_string());
    h.store.update_invoice(&invoice).await.unwrap();

    let stored = h
        .store
        .invoice_by_id(invoice.invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_paid);
    assert!(stored.delinquency_processed);
    assert!(stored.next_invoice_generated);
    // Non-flag columns still take the latest write.
    assert_eq!(stored.notes.as_deref(), Some("stale write"));
}

#[tokio::test]
async fn overdue_scan_orders_by_due_date_and_pages() {
    let h = TestHarness::new();
    let basic = h.plan("Basic", 5000, true).await;
    let mut due_dates = Vec::new();
    for day in [20, 5, 12] {
        let member = h.member(Some(basic.plan_id)).await;
        h.invoice(&member, &basic, month(2025, 3), date(2025, 3, day))
            .await;
        due_dates.push(date(2025, 3, day));
    }

    let page = h
        .store
        .overdue_unprocessed(date(2025, 4, 1), 2, 0)
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].due_date, date(2025, 3, 5));
    assert_eq!(page[1].due_date, date(2025, 3, 12));

    let page = h
        .store
        .overdue_unprocessed(date(2025, 4, 1), 2, 2)
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].due_date, date(2025, 3, 20));
}

#[tokio::test]
async fn overdue_count_includes_processed_but_not_paid() {
    let h = TestHarness::new();
    let basic = h.plan("Basic", 5000, true).await;

    let member = h.member(Some(basic.plan_id)).await;
    let mut processed = h
        .invoice(&member, &basic, month(2025, 2), date(2025, 2, 15))
        .await;
    processed.delinquency_processed = true;
    h.store.update_invoice(&processed).await.unwrap();

    let member = h.member(Some(basic.plan_id)).await;
    h.invoice(&member, &basic, month(2025, 3), date(2025, 3, 15))
        .await;

    let member = h.member(Some(basic.plan_id)).await;
    h.paid_invoice(&member, &basic, month(2025, 3), date(2025, 3, 15))
        .await;

    let count = h.store.count_overdue_unpaid(date(2025, 4, 1)).await.unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn member_invoices_come_back_newest_first() {
    let h = TestHarness::new();
    let basic = h.plan("Basic", 5000, true).await;
    let member = h.member(Some(basic.plan_id)).await;
    for m in 1..=3 {
        h.invoice(&member, &basic, month(2025, m), date(2025, m, 15))
            .await;
    }

    let invoices = h
        .store
        .invoices_for_member(member.member_id)
        .await
        .unwrap();
    assert_eq!(invoices.len(), 3);
    assert_eq!(invoices[0].reference_month, month(2025, 3));
    assert_eq!(invoices[2].reference_month, month(2025, 1));
}
