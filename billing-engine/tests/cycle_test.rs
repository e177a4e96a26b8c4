mod common;

use billing_engine::store::{InvoiceStore, MemberStore};
use common::*;

// A member with a fresh delinquency must lose the plan before the
// generator reviews their older paid invoice, so no new period is opened.
#[tokio::test]
async fn delinquency_runs_strictly_before_generation() {
    let h = TestHarness::new();
    let basic = h.plan("Basic", 5000, true).await;
    let member = h.member(Some(basic.plan_id)).await;
    let paid = h
        .paid_invoice(&member, &basic, month(2025, 1), date(2025, 1, 15))
        .await;
    let overdue = h
        .invoice(&member, &basic, month(2025, 2), date(2025, 2, 10))
        .await;

    let report = h.orchestrator().run_cycle(date(2025, 3, 1)).await.unwrap();

    assert_eq!(report.delinquencies_processed, 1);
    assert_eq!(report.invoices_generated, 0);

    let member = h
        .store
        .member_by_id(member.member_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member.plan_id, None);

    let overdue = h
        .store
        .invoice_by_id(overdue.invoice_id)
        .await
        .unwrap()
        .unwrap();
    assert!(overdue.delinquency_processed);

    // The paid January invoice was reviewed by the generator but could not
    // produce a successor for the now-planless member.
    let paid = h.store.invoice_by_id(paid.invoice_id).await.unwrap().unwrap();
    assert!(!paid.next_invoice_generated);
    assert_eq!(h.store.invoice_count().await, 2);
}

#[tokio::test]
async fn cycle_report_counts_both_phases() {
    let h = TestHarness::new();
    let basic = h.plan("Basic", 5000, true).await;

    // Two members in good standing, due for the next period.
    for _ in 0..2 {
        let member = h.member(Some(basic.plan_id)).await;
        h.paid_invoice(&member, &basic, month(2025, 2), date(2025, 2, 15))
            .await;
    }
    // Three delinquent members.
    for _ in 0..3 {
        let member = h.member(Some(basic.plan_id)).await;
        h.invoice(&member, &basic, month(2025, 2), date(2025, 2, 15))
            .await;
    }

    let report = h.orchestrator().run_cycle(date(2025, 3, 1)).await.unwrap();

    assert_eq!(report.delinquencies_processed, 3);
    assert_eq!(report.invoices_generated, 2);
    assert_eq!(h.store.invoice_count().await, 7);
}

#[tokio::test]
async fn empty_store_yields_an_empty_report() {
    let h = TestHarness::new();
    let report = h.orchestrator().run_cycle(date(2025, 3, 1)).await.unwrap();
    assert_eq!(report.delinquencies_processed, 0);
    assert_eq!(report.invoices_generated, 0);
}
