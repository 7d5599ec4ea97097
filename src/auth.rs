use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts, RequestPartsExt};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{Duration, Utc};
use email_address::EmailAddress;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        trip::Trip,
        user::{User, UserProfile},
    },
    state::AppState,
    trips::fetch_trip,
};

const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| AppError::Other(anyhow::anyhow!("password hashing failed: {err}")))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| AppError::Other(anyhow::anyhow!("stored password hash unreadable: {err}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Signs a bearer token carrying the user id, valid for seven days. There is
/// no revocation list; logout is the client discarding its copy.
pub fn issue_token(user_id: &str, key: &EncodingKey) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
    };
    jsonwebtoken::encode(&Header::default(), &claims, key)
        .map_err(|err| AppError::Other(anyhow::anyhow!("token signing failed: {err}")))
}

pub fn verify_token(token: &str, key: &DecodingKey) -> Result<String, AppError> {
    let data = jsonwebtoken::decode::<Claims>(token, key, &Validation::default())
        .map_err(|_| AppError::Unauthorized)?;
    Ok(data.claims.sub)
}

/// The caller's identity, resolved from the `Authorization: Bearer` header.
/// Handlers receive it as an explicit parameter.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Unauthorized)?;

        let user_id = verify_token(bearer.token(), &state.jwt_decoding)?;

        // The token may outlive the account it was issued for.
        let user = sqlx::query_as::<_, UserProfile>(
            "SELECT id, name, email, created_at FROM users WHERE id = ?",
        )
        .bind(&user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::Unauthorized)?;

        Ok(Self {
            id: user.id,
            name: user.name,
            email: user.email,
        })
    }
}

/// Loads the trip and checks the caller owns it.
pub async fn require_trip_owner(
    db: &DbPool,
    trip_id: &str,
    user_id: &str,
) -> Result<Trip, AppError> {
    let trip = fetch_trip(db, trip_id).await?;
    if trip.owner_id != user_id {
        return Err(AppError::Forbidden(
            "only the trip owner can do this".to_string(),
        ));
    }
    Ok(trip)
}

/// Loads the trip and checks the caller has a participant row on it.
pub async fn require_trip_participant(
    db: &DbPool,
    trip_id: &str,
    user_id: &str,
) -> Result<Trip, AppError> {
    let trip = fetch_trip(db, trip_id).await?;
    let membership: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM participants WHERE trip_id = ? AND user_id = ?",
    )
    .bind(trip_id)
    .bind(user_id)
    .fetch_one(db)
    .await?;
    if membership == 0 {
        return Err(AppError::Forbidden(
            "you are not a participant of this trip".to_string(),
        ));
    }
    Ok(trip)
}

pub async fn register_user(
    state: &AppState,
    name: &str,
    email: &str,
    password: &str,
) -> Result<(UserProfile, String), AppError> {
    let name = name.trim();
    let email = email.trim().to_lowercase();
    if name.is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }
    if !EmailAddress::is_valid(&email) {
        return Err(AppError::BadRequest("invalid email address".to_string()));
    }
    if password.chars().count() < 6 {
        return Err(AppError::BadRequest(
            "password must be at least 6 characters".to_string(),
        ));
    }

    let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(&email)
        .fetch_one(&state.db)
        .await?;
    if taken > 0 {
        return Err(AppError::BadRequest("email already in use".to_string()));
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email,
        password_hash: hash_password(password)?,
        created_at: Utc::now(),
    };
    sqlx::query("INSERT INTO users (id, name, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&state.db)
        .await?;

    let token = issue_token(&user.id, &state.jwt_encoding)?;
    info!(user_id = %user.id, "user registered");
    Ok((user.into(), token))
}

pub async fn authenticate_user(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<(UserProfile, String), AppError> {
    let email = email.trim().to_lowercase();
    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, password_hash, created_at FROM users WHERE email = ?",
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::Unauthorized)?;

    if !verify_password(password, &user.password_hash)? {
        return Err(AppError::Unauthorized);
    }

    let token = issue_token(&user.id, &state.jwt_encoding)?;
    Ok((user.into(), token))
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "currentPassword")]
    pub current_password: Option<String>,
    #[serde(rename = "newPassword")]
    pub new_password: Option<String>,
}

pub async fn update_profile(
    state: &AppState,
    user_id: &str,
    update: ProfileUpdate,
) -> Result<UserProfile, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, password_hash, created_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    let name = match update.name {
        Some(name) => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::BadRequest("name must not be empty".to_string()));
            }
            name
        }
        None => user.name,
    };

    let email = match update.email {
        Some(email) => {
            let email = email.trim().to_lowercase();
            if !EmailAddress::is_valid(&email) {
                return Err(AppError::BadRequest("invalid email address".to_string()));
            }
            let taken: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ? AND id != ?")
                    .bind(&email)
                    .bind(user_id)
                    .fetch_one(&state.db)
                    .await?;
            if taken > 0 {
                return Err(AppError::BadRequest("email already in use".to_string()));
            }
            email
        }
        None => user.email,
    };

    let password_hash = match update.new_password {
        Some(new_password) => {
            let current = update.current_password.as_deref().ok_or_else(|| {
                AppError::BadRequest(
                    "current password is required to change the password".to_string(),
                )
            })?;
            if !verify_password(current, &user.password_hash)? {
                return Err(AppError::BadRequest(
                    "current password is incorrect".to_string(),
                ));
            }
            if new_password.chars().count() < 6 {
                return Err(AppError::BadRequest(
                    "password must be at least 6 characters".to_string(),
                ));
            }
            hash_password(&new_password)?
        }
        None => user.password_hash,
    };

    sqlx::query("UPDATE users SET name = ?, email = ?, password_hash = ? WHERE id = ?")
        .bind(&name)
        .bind(&email)
        .bind(&password_hash)
        .bind(user_id)
        .execute(&state.db)
        .await?;

    Ok(UserProfile {
        id: user.id,
        name,
        email,
        created_at: user.created_at,
    })
}
