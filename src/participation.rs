use chrono::Utc;
use email_address::EmailAddress;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    db::DbPool,
    error::AppError,
    models::{
        invitation::Invitation,
        participant::{Participant, ParticipantView},
        trip::Trip,
    },
    state::AppState,
};

const PARTICIPANT_COLUMNS: &str =
    "id, trip_id, user_id, name, email, is_confirmed, is_owner, created_at";

pub async fn participants_of(db: &DbPool, trip_id: &str) -> Result<Vec<Participant>, AppError> {
    let participants = sqlx::query_as::<_, Participant>(&format!(
        "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE trip_id = ? ORDER BY created_at"
    ))
    .bind(trip_id)
    .fetch_all(db)
    .await?;
    Ok(participants)
}

pub async fn list_participants(
    db: &DbPool,
    trip_id: &str,
) -> Result<Vec<ParticipantView>, AppError> {
    let participants = sqlx::query_as::<_, ParticipantView>(
        "SELECT id, name, email, is_confirmed FROM participants \
         WHERE trip_id = ? ORDER BY created_at",
    )
    .bind(trip_id)
    .fetch_all(db)
    .await?;
    Ok(participants)
}

async fn fetch_participant(db: &DbPool, participant_id: &str) -> Result<Participant, AppError> {
    sqlx::query_as::<_, Participant>(&format!(
        "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE id = ?"
    ))
    .bind(participant_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound("participant not found".to_string()))
}

/// Idempotent self-join: an existing membership is returned unchanged,
/// otherwise an unconfirmed participant is created from the caller's
/// profile. The bool reports whether the caller was already a member.
pub async fn join_trip(
    db: &DbPool,
    trip: &Trip,
    user: &AuthUser,
) -> Result<(Participant, bool), AppError> {
    let existing = sqlx::query_as::<_, Participant>(&format!(
        "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE trip_id = ? AND user_id = ?"
    ))
    .bind(&trip.id)
    .bind(&user.id)
    .fetch_optional(db)
    .await?;
    if let Some(participant) = existing {
        return Ok((participant, true));
    }

    let participant = Participant {
        id: Uuid::new_v4().to_string(),
        trip_id: trip.id.clone(),
        user_id: Some(user.id.clone()),
        name: Some(user.name.clone()),
        email: user.email.clone(),
        is_confirmed: false,
        is_owner: false,
        created_at: Utc::now(),
    };
    sqlx::query(
        "INSERT INTO participants (id, trip_id, user_id, name, email, is_confirmed, is_owner, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&participant.id)
    .bind(&participant.trip_id)
    .bind(participant.user_id.as_deref())
    .bind(participant.name.as_deref())
    .bind(&participant.email)
    .bind(participant.is_confirmed)
    .bind(participant.is_owner)
    .bind(participant.created_at)
    .execute(db)
    .await?;

    info!(trip_id = %trip.id, user_id = %user.id, "user joined trip");
    Ok((participant, false))
}

/// Self-removal. The owner has no exit path except deleting the trip.
pub async fn leave_trip(db: &DbPool, trip: &Trip, user: &AuthUser) -> Result<(), AppError> {
    if trip.owner_id == user.id {
        return Err(AppError::InvalidState(
            "the trip owner cannot leave the trip; delete the trip instead".to_string(),
        ));
    }

    let participant = sqlx::query_as::<_, Participant>(&format!(
        "SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE trip_id = ? AND user_id = ?"
    ))
    .bind(&trip.id)
    .bind(&user.id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| AppError::NotFound("you are not a participant of this trip".to_string()))?;

    sqlx::query("DELETE FROM participants WHERE id = ?")
        .bind(&participant.id)
        .execute(db)
        .await?;
    info!(trip_id = %trip.id, user_id = %user.id, "user left trip");
    Ok(())
}

/// Flips the confirmation flag, but only for the participant record backed
/// by the caller's own account.
pub async fn set_self_confirmation(
    db: &DbPool,
    participant_id: &str,
    user_id: &str,
    confirmed: bool,
) -> Result<Participant, AppError> {
    let participant = fetch_participant(db, participant_id).await?;
    if participant.user_id.as_deref() != Some(user_id) {
        return Err(AppError::Forbidden(
            "you can only manage your own participation".to_string(),
        ));
    }

    sqlx::query("UPDATE participants SET is_confirmed = ? WHERE id = ?")
        .bind(confirmed)
        .bind(participant_id)
        .execute(db)
        .await?;

    Ok(Participant {
        is_confirmed: confirmed,
        ..participant
    })
}

/// Owner-only removal of an unconfirmed participant. Confirmed participants
/// are committed and stay.
pub async fn remove_participant(
    state: &AppState,
    trip: &Trip,
    participant_id: &str,
) -> Result<(), AppError> {
    let participant = fetch_participant(&state.db, participant_id).await?;
    if participant.trip_id != trip.id {
        return Err(AppError::NotFound(
            "participant not found in this trip".to_string(),
        ));
    }
    if participant.is_confirmed {
        return Err(AppError::InvalidState(
            "cannot remove a confirmed participant".to_string(),
        ));
    }

    sqlx::query("DELETE FROM participants WHERE id = ?")
        .bind(participant_id)
        .execute(&state.db)
        .await?;

    state.mailer.send_removal_notice(&participant, trip).await?;
    info!(trip_id = %trip.id, participant_id, "participant removed");
    Ok(())
}

/// Owner-only. Records the invitation and, when the address has no
/// participant row yet, an unconfirmed placeholder, then emails the invite.
pub async fn invite(state: &AppState, trip: &Trip, email: &str) -> Result<Invitation, AppError> {
    let email = email.trim().to_lowercase();
    if !EmailAddress::is_valid(&email) {
        return Err(AppError::BadRequest("invalid email address".to_string()));
    }

    let invitation = Invitation {
        id: Uuid::new_v4().to_string(),
        trip_id: trip.id.clone(),
        email: email.clone(),
        created_at: Utc::now(),
    };

    let mut tx = state.db.begin().await?;
    sqlx::query("INSERT INTO invitations (id, trip_id, email, created_at) VALUES (?, ?, ?, ?)")
        .bind(&invitation.id)
        .bind(&invitation.trip_id)
        .bind(&invitation.email)
        .bind(invitation.created_at)
        .execute(&mut *tx)
        .await?;

    let existing: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM participants WHERE trip_id = ? AND email = ?")
            .bind(&trip.id)
            .bind(&email)
            .fetch_one(&mut *tx)
            .await?;
    if existing == 0 {
        sqlx::query(
            "INSERT INTO participants (id, trip_id, email, is_confirmed, is_owner, created_at) \
             VALUES (?, ?, ?, 0, 0, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&trip.id)
        .bind(&email)
        .bind(invitation.created_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    state.mailer.send_trip_invite(&email, trip).await?;
    info!(trip_id = %trip.id, %email, "invite sent");
    Ok(invitation)
}
