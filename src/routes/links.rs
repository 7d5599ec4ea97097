use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};

use crate::{
    auth::{self, AuthUser},
    error::AppError,
    links::{self, LinkInput},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips/:trip_id/links", get(list_links).post(create_link))
        .route(
            "/trips/:trip_id/links/:link_id",
            put(update_link).delete(delete_link),
        )
}

async fn create_link(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    user: AuthUser,
    Json(input): Json<LinkInput>,
) -> Result<Json<Value>, AppError> {
    let trip = auth::require_trip_participant(&state.db, &trip_id, &user.id).await?;
    let link = links::create_link(&state.db, &trip, input).await?;
    Ok(Json(json!({ "linkId": link.id })))
}

async fn list_links(
    State(state): State<AppState>,
    Path(trip_id): Path<String>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    auth::require_trip_participant(&state.db, &trip_id, &user.id).await?;
    let links = links::list_links(&state.db, &trip_id).await?;
    Ok(Json(json!({ "links": links })))
}

async fn update_link(
    State(state): State<AppState>,
    Path((trip_id, link_id)): Path<(String, String)>,
    user: AuthUser,
    Json(input): Json<LinkInput>,
) -> Result<Json<Value>, AppError> {
    let trip = auth::require_trip_participant(&state.db, &trip_id, &user.id).await?;
    let link = links::update_link(&state.db, &trip, &link_id, input).await?;
    Ok(Json(json!({ "link": link })))
}

async fn delete_link(
    State(state): State<AppState>,
    Path((trip_id, link_id)): Path<(String, String)>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let trip = auth::require_trip_participant(&state.db, &trip_id, &user.id).await?;
    links::delete_link(&state.db, &trip, &link_id).await?;
    Ok(Json(json!({ "message": "Link deleted successfully." })))
}
