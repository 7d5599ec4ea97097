use axum::{
    extract::{Path, State},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    auth::{self, AuthUser},
    error::AppError,
    participation,
    state::AppState,
    trips,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips/:trip_id/join", post(join_trip))
        .route("/trips/:trip_id/leave", delete(leave_trip))
        .route("/trips/:trip_id/participants", get(list_participants))
        .route(
            "/trips/:trip_id/participants/:participant_id",
            delete(remove_participant),
        )
        .route("/trips/:trip_id/invites", post(create_invite))
        .route(
            "/participants/:participant_id/confirm-self",
            patch(confirm_self),
        )
        .route(
            "/participants/:participant_id/unconfirm-self",
            patch(unconfirm_self),
        )
}

async fn join_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let trip = trips::fetch_trip(&state.db, &trip_id).await?;
    let (participant, already_member) = participation::join_trip(&state.db, &trip, &user).await?;
    let message = if already_member {
        "You are already a participant of this trip."
    } else {
        "Successfully joined the trip."
    };
    Ok(Json(json!({ "message": message, "participant": participant })))
}

async fn leave_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let trip = auth::require_trip_participant(&state.db, &trip_id, &user.id).await?;
    participation::leave_trip(&state.db, &trip, &user).await?;
    Ok(Json(json!({ "message": "Successfully left the trip." })))
}

async fn list_participants(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    auth::require_trip_participant(&state.db, &trip_id, &user.id).await?;
    let participants = participation::list_participants(&state.db, &trip_id).await?;
    Ok(Json(json!({ "participants": participants })))
}

async fn remove_participant(
    State(state): State<AppState>,
    Path((trip_id, participant_id)): Path<(String, String)>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let trip = auth::require_trip_owner(&state.db, &trip_id, &user.id).await?;
    participation::remove_participant(&state, &trip, &participant_id).await?;
    Ok(Json(json!({ "message": "Participant removed successfully." })))
}

#[derive(Deserialize)]
struct InviteBody {
    email: String,
}

async fn create_invite(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    user: AuthUser,
    Json(body): Json<InviteBody>,
) -> Result<Json<Value>, AppError> {
    let trip = auth::require_trip_owner(&state.db, &trip_id, &user.id).await?;
    let invitation = participation::invite(&state, &trip, &body.email).await?;
    Ok(Json(json!({ "inviteId": invitation.id })))
}

async fn confirm_self(
    State(state): State<AppState>,
    Path(participant_id): Path<String>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let participant =
        participation::set_self_confirmation(&state.db, &participant_id, &user.id, true).await?;
    Ok(Json(json!({ "participant": participant })))
}

async fn unconfirm_self(
    State(state): State<AppState>,
    Path(participant_id): Path<String>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let participant =
        participation::set_self_confirmation(&state.db, &participant_id, &user.id, false).await?;
    Ok(Json(json!({ "participant": participant })))
}
