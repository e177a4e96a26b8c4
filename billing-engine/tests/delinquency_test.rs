mod common;

use billing_engine::store::{InvoiceStore, MemberStore};
use common::*;

#[tokio::test]
async fn overdue_unpaid_invoice_revokes_both_plan_references() {
    let h = TestHarness::new();
    let basic = h.plan("Basic", 5000, true).await;
    let premium = h.plan("Premium", 9000, true).await;
    let member = h
        .member_with_plans(Some(basic.plan_id), Some(premium.plan_id))
        .await;
    let invoice = h
        .invoice(&member, &basic, month(2025, 3), date(2025, 3, 14))
        .await;

    let processed = h.delinquency().run(date(2025, 3, 15)).await.unwrap();

    assert_eq!(processed, 1);
    let invoice = h
        .store
        .invoice_by_id(invoice.invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert!(invoice.delinquency_processed);
    assert!(!invoice.is_paid);
    let member = h
        .store
        .member_by_id(member.member_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member.plan_id, None);
    assert_eq!(member.pending_plan_id, None);
}

#[tokio::test]
async fn invoice_due_today_is_not_delinquent_yet() {
    let h = TestHarness::new();
    let basic = h.plan("Basic", 5000, true).await;
    let member = h.member(Some(basic.plan_id)).await;
    let invoice = h
        .invoice(&member, &basic, month(2025, 3), date(2025, 3, 15))
        .await;

    let processed = h.delinquency().run(date(2025, 3, 15)).await.unwrap();

    assert_eq!(processed, 0);
    let invoice = h
        .store
        .invoice_by_id(invoice.invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!invoice.delinquency_processed);
    let member = h
        .store
        .member_by_id(member.member_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member.plan_id, Some(basic.plan_id));
}

#[tokio::test]
async fn paid_invoices_are_left_alone() {
    let h = TestHarness::new();
    let basic = h.plan("Basic", 5000, true).await;
    let member = h.member(Some(basic.plan_id)).await;
    h.paid_invoice(&member, &basic, month(2025, 3), date(2025, 3, 10))
        .await;

    let processed = h.delinquency().run(date(2025, 3, 20)).await.unwrap();

    assert_eq!(processed, 0);
    let member = h
        .store
        .member_by_id(member.member_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member.plan_id, Some(basic.plan_id));
}

#[tokio::test]
async fn already_processed_invoices_are_not_selected_again() {
    let h = TestHarness::new();
    let basic = h.plan("Basic", 5000, true).await;
    let member = h.member(Some(basic.plan_id)).await;
    let mut invoice = h
        .invoice(&member, &basic, month(2025, 3), date(2025, 3, 10))
        .await;
    invoice.delinquency_processed = true;
    h.store.update_invoice(&invoice).await.unwrap();
    // The member kept their plan somehow; processing must not touch it again.
    let processed = h.delinquency().run(date(2025, 3, 20)).await.unwrap();

    assert_eq!(processed, 0);
    let member = h
        .store
        .member_by_id(member.member_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member.plan_id, Some(basic.plan_id));
}

#[tokio::test]
async fn processes_more_invoices_than_one_batch() {
    let h = TestHarness::with_batch_size(50);
    let basic = h.plan("Basic", 5000, true).await;
    let mut invoice_ids = Vec::new();
    for _ in 0..130 {
        let member = h.member(Some(basic.plan_id)).await;
        let invoice = h
            .invoice(&member, &basic, month(2025, 3), date(2025, 3, 10))
            .await;
        invoice_ids.push(invoice.invoice_id);
    }

    let processed = h.delinquency().run(date(2025, 4, 1)).await.unwrap();

    assert_eq!(processed, 130);
    for id in invoice_ids {
        let invoice = h.store.invoice_by_id(id).await.unwrap().unwrap();
        assert!(invoice.delinquency_processed);
    }
}

#[tokio::test]
async fn invoice_with_missing_member_is_skipped_without_stalling() {
    let h = TestHarness::with_batch_size(2);
    let basic = h.plan("Basic", 5000, true).await;
    // One orphaned invoice that will stay in the predicate forever.
    let ghost = h.member(Some(basic.plan_id)).await;
    let orphan = billing_engine::models::Invoice::new(
        uuid::Uuid::new_v4(),
        &basic,
        month(2025, 3),
        date(2025, 3, 1),
        chrono::Utc::now(),
    );
    h.store.insert_invoice(&orphan).await.unwrap();
    let real = h
        .invoice(&ghost, &basic, month(2025, 3), date(2025, 3, 10))
        .await;
    for _ in 0..3 {
        let member = h.member(Some(basic.plan_id)).await;
        h.invoice(&member, &basic, month(2025, 3), date(2025, 3, 12))
            .await;
    }

    let processed = h.delinquency().run(date(2025, 4, 1)).await.unwrap();

    // Everything but the orphan was processed, and the run terminated.
    assert_eq!(processed, 4);
    let real = h.store.invoice_by_id(real.invoice_id).await.unwrap().unwrap();
    assert!(real.delinquency_processed);
    let orphan = h
        .store
        .invoice_by_id(orphan.invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!orphan.delinquency_processed);
}
