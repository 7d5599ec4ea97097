use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: String,
    pub trip_id: String,
    pub title: String,
    pub occurs_at: DateTime<Utc>,
}

/// One day of the trip's span with the activities that fall on it.
#[derive(Debug, Clone, Serialize)]
pub struct DaySchedule {
    pub date: DateTime<Utc>,
    pub activities: Vec<Activity>,
}
