//! Administrative payment recording.

use chrono::{FixedOffset, NaiveDate, Utc};
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::models::Invoice;
use crate::services::metrics::record_payment;
use crate::store::{BillingStore, InvoiceStore};

/// Records manual payments against invoices.
///
/// This is the only path by which an invoice becomes paid.
pub struct PaymentRecorder {
    store: Arc<dyn BillingStore>,
    billing_zone: FixedOffset,
}

impl PaymentRecorder {
    pub fn new(store: Arc<dyn BillingStore>, billing_zone: FixedOffset) -> Self {
        Self {
            store,
            billing_zone,
        }
    }

    /// Mark an invoice paid today, attributed to `admin`.
    #[instrument(skip(self))]
    pub async fn record_payment(&self, invoice_id: Uuid, admin: &str) -> Result<Invoice, AppError> {
        let today = Utc::now().with_timezone(&self.billing_zone).date_naive();
        self.record_payment_at(invoice_id, admin, today).await
    }

    pub async fn record_payment_at(
        &self,
        invoice_id: Uuid,
        admin: &str,
        today: NaiveDate,
    ) -> Result<Invoice, AppError> {
        let mut invoice = self
            .store
            .invoice_by_id(invoice_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Invoice {} not found", invoice_id))
            })?;

        if invoice.is_paid {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Invoice {} is already paid",
                invoice_id
            )));
        }

        invoice.is_paid = true;
        invoice.payment_date = Some(today);
        invoice.append_note(&format!("Payment recorded by administrator {}", admin));
        self.store.update_invoice(&invoice).await?;

        record_payment();
        info!(
            %invoice_id,
            member_id = %invoice.member_id,
            payment_date = %today,
            admin = admin,
            "Payment recorded"
        );
        Ok(invoice)
    }
}
