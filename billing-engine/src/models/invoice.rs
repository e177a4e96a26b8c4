//! Invoice model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::Plan;

/// Maximum length of the free-text notes column.
pub const MAX_NOTES_LEN: usize = 500;

/// One billing-period charge for a member.
///
/// Unique per (member_id, reference_month). The two processing flags are
/// monotonic: once true they are never reset.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub member_id: Uuid,
    pub plan_id: Uuid,
    /// First day of the calendar month this invoice bills for.
    pub reference_month: NaiveDate,
    /// Amount in minor currency units, frozen at creation time.
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    pub is_paid: bool,
    pub delinquency_processed: bool,
    pub next_invoice_generated: bool,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Invoice {
    /// Build a new unpaid invoice for a member at the plan's current price.
    pub fn new(
        member_id: Uuid,
        plan: &Plan,
        reference_month: NaiveDate,
        due_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            invoice_id: Uuid::new_v4(),
            member_id,
            plan_id: plan.plan_id,
            reference_month,
            amount_cents: plan.price_cents,
            due_date,
            payment_date: None,
            is_paid: false,
            delinquency_processed: false,
            next_invoice_generated: false,
            notes: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Append an audit note, keeping the column within its length limit.
    pub fn append_note(&mut self, note: &str) {
        let combined = match self.notes.take() {
            Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, note),
            _ => note.to_string(),
        };
        self.notes = Some(truncate_chars(combined, MAX_NOTES_LEN));
    }
}

fn truncate_chars(s: String, max: usize) -> String {
    if s.chars().count() <= max {
        s
    } else {
        s.chars().take(max).collect()
    }
}
