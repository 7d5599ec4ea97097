use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Email-addressed placeholder for someone who has not joined yet.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invitation {
    pub id: String,
    pub trip_id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}
