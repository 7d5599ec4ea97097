use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    auth::{self, AuthUser, ProfileUpdate},
    error::AppError,
    state::AppState,
    trips,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/profile", put(update_profile))
        .route("/user/trips", get(user_trips))
}

#[derive(Deserialize)]
struct RegisterBody {
    name: String,
    email: String,
    password: String,
    #[serde(rename = "confirmPassword")]
    confirm_password: String,
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<Json<Value>, AppError> {
    if body.password != body.confirm_password {
        return Err(AppError::BadRequest("passwords do not match".to_string()));
    }
    let (user, token) =
        auth::register_user(&state, &body.name, &body.email, &body.password).await?;
    Ok(Json(json!({ "user": user, "token": token })))
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<Value>, AppError> {
    let (user, token) = auth::authenticate_user(&state, &body.email, &body.password).await?;
    Ok(Json(json!({ "user": user, "token": token })))
}

async fn me(user: AuthUser) -> Json<Value> {
    Json(json!({ "user": user }))
}

async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Value>, AppError> {
    let profile = auth::update_profile(&state, &user.id, update).await?;
    Ok(Json(json!({ "user": profile })))
}

async fn user_trips(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let (owned, participating) = trips::user_trips(&state.db, &user.id).await?;
    Ok(Json(
        json!({ "ownedTrips": owned, "participatingTrips": participating }),
    ))
}
