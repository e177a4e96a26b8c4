//! Membership plan model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Subscription tier.
///
/// Inactive plans cannot be newly assigned but stay referenced by
/// historical invoices.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub plan_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Monthly price in minor currency units.
    pub price_cents: i64,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}
