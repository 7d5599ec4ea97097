use axum::{
    extract::{Path, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    auth::{self, AuthUser},
    error::AppError,
    state::AppState,
    trips::{self, NewTrip, TripPatch},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips", post(create_trip))
        .route(
            "/trips/:trip_id",
            get(trip_details).put(update_trip).delete(delete_trip),
        )
        .route("/trips/:trip_id/public", get(public_view))
        .route("/trips/:trip_id/confirm", get(confirm_trip))
}

async fn create_trip(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<NewTrip>,
) -> Result<Json<Value>, AppError> {
    let trip = trips::create_trip(&state, &user.id, &user.name, &user.email, input).await?;
    Ok(Json(json!({ "tripId": trip.id })))
}

#[derive(Serialize)]
struct TripDetails {
    id: String,
    destination: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    is_confirmed: bool,
    is_owner: bool,
}

async fn trip_details(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let trip = auth::require_trip_participant(&state.db, &trip_id, &user.id).await?;
    let is_owner = trip.owner_id == user.id;
    let details = TripDetails {
        id: trip.id,
        destination: trip.destination,
        starts_at: trip.starts_at,
        ends_at: trip.ends_at,
        is_confirmed: trip.is_confirmed,
        is_owner,
    };
    Ok(Json(json!({ "trip": details })))
}

async fn update_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    user: AuthUser,
    Json(patch): Json<TripPatch>,
) -> Result<Json<Value>, AppError> {
    let trip = auth::require_trip_owner(&state.db, &trip_id, &user.id).await?;
    let updated = trips::update_trip(&state, &trip, patch).await?;
    Ok(Json(json!({ "tripId": updated.id.clone(), "trip": updated })))
}

async fn delete_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    auth::require_trip_owner(&state.db, &trip_id, &user.id).await?;
    trips::delete_trip(&state.db, &trip_id).await?;
    Ok(Json(json!({ "message": "Trip deleted successfully." })))
}

async fn public_view(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let trip = trips::public_view(&state.db, &trip_id).await?;
    Ok(Json(json!({ "trip": trip })))
}

async fn confirm_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
) -> Result<Redirect, AppError> {
    let target = trips::confirm_trip(&state, &trip_id).await?;
    Ok(Redirect::to(&target))
}
