use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};

use crate::{
    activities::{self, ActivityInput},
    auth::{self, AuthUser},
    error::AppError,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/trips/:trip_id/activities",
            get(list_activities).post(create_activity),
        )
        .route(
            "/trips/:trip_id/activities/:activity_id",
            put(update_activity).delete(delete_activity),
        )
}

async fn create_activity(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    user: AuthUser,
    Json(input): Json<ActivityInput>,
) -> Result<Json<Value>, AppError> {
    let trip = auth::require_trip_participant(&state.db, &trip_id, &user.id).await?;
    let activity = activities::create_activity(&state.db, &trip, input).await?;
    Ok(Json(json!({ "activityId": activity.id })))
}

async fn list_activities(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let trip = auth::require_trip_participant(&state.db, &trip_id, &user.id).await?;
    let schedule = activities::list_activities(&state.db, &trip).await?;
    Ok(Json(json!({ "activities": schedule })))
}

async fn update_activity(
    State(state): State<AppState>,
    Path((trip_id, activity_id)): Path<(String, String)>,
    user: AuthUser,
    Json(input): Json<ActivityInput>,
) -> Result<Json<Value>, AppError> {
    let trip = auth::require_trip_participant(&state.db, &trip_id, &user.id).await?;
    let activity = activities::update_activity(&state.db, &trip, &activity_id, input).await?;
    Ok(Json(json!({ "activity": activity })))
}

async fn delete_activity(
    State(state): State<AppState>,
    Path((trip_id, activity_id)): Path<(String, String)>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let trip = auth::require_trip_participant(&state.db, &trip_id, &user.id).await?;
    activities::delete_activity(&state.db, &trip, &activity_id).await?;
    Ok(Json(json!({ "message": "Activity deleted successfully." })))
}
