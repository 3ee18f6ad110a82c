// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, conflict_or_internal},
    models::user::{CreateUserRequest, LoginRequest, User},
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

const USER_COLUMNS: &str = "id, email, password, role, name, nickname, phone, bio, created_at";

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let email = payload.email.trim().to_lowercase();
    let nickname = payload.nickname.trim().to_string();

    let taken: Option<(String,)> = sqlx::query_as(
        "SELECT CASE WHEN email = $1 THEN 'email' ELSE 'nickname' END FROM users \
         WHERE email = $1 OR nickname = $2 LIMIT 1",
    )
    .bind(&email)
    .bind(&nickname)
    .fetch_optional(&pool)
    .await?;

    if let Some((field,)) = taken {
        return Err(AppError::Conflict(format!("That {} is already in use", field)));
    }

    let hashed_password = hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (email, password, nickname) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
    ))
    .bind(&email)
    .bind(&hashed_password)
    .bind(&nickname)
    .fetch_one(&pool)
    .await
    // Lost a race with a concurrent registration.
    .map_err(|e| conflict_or_internal(e, "Email or nickname is already in use"))?;

    tracing::info!("Registered user {} ({})", user.id, user.nickname);

    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(payload.email.trim().to_lowercase())
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let user = user.ok_or(AppError::AuthError("Invalid email or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid email or password".to_string()));
    }

    let token = sign_jwt(user.id, &user.role, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "nickname": user.nickname,
        "role": user.role,
    })))
}
