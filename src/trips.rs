use chrono::{DateTime, Utc};
use email_address::EmailAddress;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::info;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::trip::{PublicTrip, Trip},
    participation,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct NewTrip {
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub emails_to_invite: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TripPatch {
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

pub async fn fetch_trip(db: &DbPool, trip_id: &str) -> Result<Trip, AppError> {
    sqlx::query_as::<_, Trip>(
        "SELECT id, destination, starts_at, ends_at, is_confirmed, owner_id, created_at \
         FROM trips WHERE id = ?",
    )
    .bind(trip_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound("trip not found".to_string()))
}

/// Creates the trip, the pre-confirmed owner participant, and one
/// unconfirmed participant per invited address in a single transaction, then
/// emails the owner a confirmation link.
pub async fn create_trip(
    state: &AppState,
    owner_id: &str,
    owner_name: &str,
    owner_email: &str,
    input: NewTrip,
) -> Result<Trip, AppError> {
    let destination = validate_destination(&input.destination)?;
    let now = Utc::now();
    validate_trip_dates(input.starts_at, input.ends_at, now)?;
    for email in &input.emails_to_invite {
        if !EmailAddress::is_valid(email) {
            return Err(AppError::BadRequest(format!("invalid invite email: {email}")));
        }
    }

    let trip = Trip {
        id: Uuid::new_v4().to_string(),
        destination,
        starts_at: input.starts_at,
        ends_at: input.ends_at,
        is_confirmed: false,
        owner_id: owner_id.to_string(),
        created_at: now,
    };

    let mut tx = state.db.begin().await?;
    sqlx::query(
        "INSERT INTO trips (id, destination, starts_at, ends_at, is_confirmed, owner_id, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&trip.id)
    .bind(&trip.destination)
    .bind(trip.starts_at)
    .bind(trip.ends_at)
    .bind(trip.is_confirmed)
    .bind(&trip.owner_id)
    .bind(trip.created_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO participants (id, trip_id, user_id, name, email, is_confirmed, is_owner, created_at) \
         VALUES (?, ?, ?, ?, ?, 1, 1, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&trip.id)
    .bind(owner_id)
    .bind(owner_name)
    .bind(owner_email)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    for email in &input.emails_to_invite {
        sqlx::query(
            "INSERT INTO participants (id, trip_id, email, is_confirmed, is_owner, created_at) \
             VALUES (?, ?, ?, 0, 0, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&trip.id)
        .bind(email)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    state
        .mailer
        .send_trip_confirmation(owner_name, owner_email, &trip)
        .await?;
    info!(trip_id = %trip.id, "trip created");
    Ok(trip)
}

/// Owner-only. Re-validates the date invariants, persists the change, and
/// notifies every current participant.
pub async fn update_trip(state: &AppState, trip: &Trip, patch: TripPatch) -> Result<Trip, AppError> {
    let destination = validate_destination(&patch.destination)?;
    validate_trip_dates(patch.starts_at, patch.ends_at, Utc::now())?;

    sqlx::query("UPDATE trips SET destination = ?, starts_at = ?, ends_at = ? WHERE id = ?")
        .bind(&destination)
        .bind(patch.starts_at)
        .bind(patch.ends_at)
        .bind(&trip.id)
        .execute(&state.db)
        .await?;

    let updated = Trip {
        destination,
        starts_at: patch.starts_at,
        ends_at: patch.ends_at,
        ..trip.clone()
    };

    let participants = participation::participants_of(&state.db, &trip.id).await?;
    state.mailer.send_trip_updated(&participants, &updated).await?;
    info!(trip_id = %updated.id, "trip updated");
    Ok(updated)
}

/// Owner-only cascading delete: invitations, activities, links and
/// participants go before the trip row itself, all in one transaction.
pub async fn delete_trip(db: &DbPool, trip_id: &str) -> Result<(), AppError> {
    let mut tx = db.begin().await?;
    for table in ["invitations", "activities", "links", "participants"] {
        sqlx::query(&format!("DELETE FROM {table} WHERE trip_id = ?"))
            .bind(trip_id)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query("DELETE FROM trips WHERE id = ?")
        .bind(trip_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    info!(trip_id, "trip deleted");
    Ok(())
}

pub async fn public_view(db: &DbPool, trip_id: &str) -> Result<PublicTrip, AppError> {
    sqlx::query_as::<_, PublicTrip>(
        "SELECT id, destination, starts_at, ends_at FROM trips WHERE id = ?",
    )
    .bind(trip_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound("trip not found".to_string()))
}

/// Target of the confirmation email link. Idempotent: a confirmed trip just
/// redirects. On first confirmation every still-unconfirmed invitee gets
/// their join link. Returns the web page to redirect to.
pub async fn confirm_trip(state: &AppState, trip_id: &str) -> Result<String, AppError> {
    let trip = fetch_trip(&state.db, trip_id).await?;
    if !trip.is_confirmed {
        sqlx::query("UPDATE trips SET is_confirmed = 1 WHERE id = ?")
            .bind(trip_id)
            .execute(&state.db)
            .await?;
        let pending = participation::participants_of(&state.db, trip_id).await?;
        for participant in pending.iter().filter(|p| !p.is_confirmed) {
            state.mailer.send_trip_invite(&participant.email, &trip).await?;
        }
        info!(trip_id, "trip confirmed");
    }
    Ok(format!(
        "{}/trips/{}",
        state.config.web_base_url.trim_end_matches('/'),
        trip.id
    ))
}

#[derive(Debug, Serialize, FromRow)]
pub struct OwnedTripSummary {
    pub id: String,
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub participant_count: i64,
}

#[derive(Debug, Serialize)]
pub struct TripOwner {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct JoinedTripSummary {
    pub id: String,
    pub destination: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub participant_count: i64,
    pub owner: TripOwner,
}

#[derive(Debug, FromRow)]
struct JoinedTripRow {
    id: String,
    destination: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    is_confirmed: bool,
    created_at: DateTime<Utc>,
    participant_count: i64,
    owner_name: String,
    owner_email: String,
}

/// Trips the user owns plus trips they joined as a non-owner, newest first.
pub async fn user_trips(
    db: &DbPool,
    user_id: &str,
) -> Result<(Vec<OwnedTripSummary>, Vec<JoinedTripSummary>), AppError> {
    let owned = sqlx::query_as::<_, OwnedTripSummary>(
        "SELECT t.id, t.destination, t.starts_at, t.ends_at, t.is_confirmed, t.created_at, \
                (SELECT COUNT(*) FROM participants p WHERE p.trip_id = t.id) AS participant_count \
         FROM trips t WHERE t.owner_id = ? ORDER BY t.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    let joined = sqlx::query_as::<_, JoinedTripRow>(
        "SELECT t.id, t.destination, t.starts_at, t.ends_at, t.is_confirmed, t.created_at, \
                u.name AS owner_name, u.email AS owner_email, \
                (SELECT COUNT(*) FROM participants p2 WHERE p2.trip_id = t.id) AS participant_count \
         FROM trips t \
         JOIN participants p ON p.trip_id = t.id AND p.user_id = ? AND p.is_owner = 0 \
         JOIN users u ON u.id = t.owner_id \
         ORDER BY t.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?
    .into_iter()
    .map(|row| JoinedTripSummary {
        id: row.id,
        destination: row.destination,
        starts_at: row.starts_at,
        ends_at: row.ends_at,
        is_confirmed: row.is_confirmed,
        created_at: row.created_at,
        participant_count: row.participant_count,
        owner: TripOwner {
            name: row.owner_name,
            email: row.owner_email,
        },
    })
    .collect();

    Ok((owned, joined))
}

fn validate_destination(destination: &str) -> Result<String, AppError> {
    let destination = destination.trim();
    if destination.chars().count() < 4 {
        return Err(AppError::BadRequest(
            "destination must be at least 4 characters".to_string(),
        ));
    }
    Ok(destination.to_string())
}

pub fn validate_trip_dates(
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if starts_at < now {
        return Err(AppError::BadRequest("invalid trip start date".to_string()));
    }
    if ends_at < starts_at {
        return Err(AppError::BadRequest("invalid trip end date".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn rejects_start_in_the_past() {
        let now = Utc::now();
        let err = validate_trip_dates(now - Duration::hours(1), now + Duration::days(3), now);
        assert!(matches!(err, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn rejects_end_before_start() {
        let now = Utc::now();
        let err = validate_trip_dates(now + Duration::days(5), now + Duration::days(2), now);
        assert!(matches!(err, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn accepts_single_day_trip() {
        let now = Utc::now();
        let day = now + Duration::days(1);
        assert!(validate_trip_dates(day, day, now).is_ok());
    }

    #[test]
    fn destination_must_have_four_characters() {
        assert!(validate_destination("  Rio ").is_err());
        assert_eq!(validate_destination(" Lima ").unwrap(), "Lima");
    }
}
