//! Member model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Gym member.
///
/// Member rows are owned by the membership subsystem; the billing engine
/// only writes the two plan references.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Member {
    pub member_id: Uuid,
    pub email: String,
    pub display_name: String,
    /// Currently active plan, if any.
    pub plan_id: Option<Uuid>,
    /// Plan the member asked to switch to at the next billing boundary.
    pub pending_plan_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}
