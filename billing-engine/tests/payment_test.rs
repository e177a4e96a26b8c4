mod common;

use billing_engine::store::InvoiceStore;
use common::*;
use service_core::error::AppError;
use uuid::Uuid;

#[tokio::test]
async fn payment_marks_the_invoice_paid_with_an_audit_note() {
    let h = TestHarness::new();
    let basic = h.plan("Basic", 5000, true).await;
    let member = h.member(Some(basic.plan_id)).await;
    let invoice = h
        .invoice(&member, &basic, month(2025, 3), date(2025, 3, 15))
        .await;

    let paid = h
        .payments()
        .record_payment_at(invoice.invoice_id, "front-desk", date(2025, 3, 12))
        .await
        .unwrap();

    assert!(paid.is_paid);
    assert_eq!(paid.payment_date, Some(date(2025, 3, 12)));
    assert!(paid
        .notes
        .as_deref()
        .unwrap()
        .contains("Payment recorded by administrator front-desk"));

    let stored = h
        .store
        .invoice_by_id(invoice.invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_paid);
}

#[tokio::test]
async fn paying_twice_is_a_conflict() {
    let h = TestHarness::new();
    let basic = h.plan("Basic", 5000, true).await;
    let member = h.member(Some(basic.plan_id)).await;
    let invoice = h
        .invoice(&member, &basic, month(2025, 3), date(2025, 3, 15))
        .await;

    h.payments()
        .record_payment_at(invoice.invoice_id, "front-desk", date(2025, 3, 12))
        .await
        .unwrap();
    let err = h
        .payments()
        .record_payment_at(invoice.invoice_id, "front-desk", date(2025, 3, 13))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let stored = h
        .store
        .invoice_by_id(invoice.invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.payment_date, Some(date(2025, 3, 12)));
}

#[tokio::test]
async fn paying_an_unknown_invoice_is_not_found() {
    let h = TestHarness::new();
    let err = h
        .payments()
        .record_payment_at(Uuid::new_v4(), "front-desk", date(2025, 3, 12))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// A payment recorded before the nightly cycle turns a would-be
// delinquency into a normal renewal.
#[tokio::test]
async fn paid_overdue_invoice_renews_instead_of_defaulting() {
    let h = TestHarness::new();
    let basic = h.plan("Basic", 5000, true).await;
    let member = h.member(Some(basic.plan_id)).await;
    let invoice = h
        .invoice(&member, &basic, month(2025, 3), date(2025, 3, 10))
        .await;

    h.payments()
        .record_payment_at(invoice.invoice_id, "front-desk", date(2025, 3, 14))
        .await
        .unwrap();

    let report = h.orchestrator().run_cycle(date(2025, 3, 15)).await.unwrap();

    assert_eq!(report.delinquencies_processed, 0);
    assert_eq!(report.invoices_generated, 1);
    let successor = h
        .store
        .invoice_for_member_month(member.member_id, month(2025, 4))
        .await
        .unwrap()
        .expect("successor invoice");
    assert_eq!(successor.due_date, date(2025, 4, 10));
}
