use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A person's membership record in a trip. Invitees that never registered
/// carry no `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Participant {
    pub id: String,
    pub trip_id: String,
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub email: String,
    pub is_confirmed: bool,
    pub is_owner: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ParticipantView {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub is_confirmed: bool,
}
