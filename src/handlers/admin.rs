// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    exam::catalog,
    models::{
        dashboard::{Banner, CreateBannerRequest, DailyTraffic},
        question::{CreateQuestionRequest, Question},
        user::User,
    },
};

/// Days covered by the traffic report.
const TRAFFIC_DAYS: i32 = 7;

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, password, role, name, nickname, phone, bio, created_at
        FROM users
        ORDER BY id DESC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(users))
}

/// Daily visit totals for the last week, newest day first.
pub async fn traffic_report(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let days = sqlx::query_as::<_, DailyTraffic>(
        r#"
        SELECT
            (created_at AT TIME ZONE 'UTC')::DATE AS day,
            COUNT(*) AS total_visits,
            COUNT(DISTINCT user_id) AS unique_users
        FROM page_views
        WHERE created_at >= NOW() - make_interval(days => $1)
        GROUP BY day
        ORDER BY day DESC
        "#,
    )
    .bind(TRAFFIC_DAYS)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to build traffic report: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(days))
}

pub async fn create_banner(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateBannerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let banner = sqlx::query_as::<_, Banner>(
        r#"
        INSERT INTO banners (title, description, image_url, link_url, position)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, title, description, image_url, link_url, position, is_active
        "#,
    )
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(&payload.image_url)
    .bind(&payload.link_url)
    .bind(payload.position)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create banner: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(banner)))
}

pub async fn delete_banner(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM banners WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Banner not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Adds a question to the bank. The assessment and subject must exist in
/// the catalog.
pub async fn create_question(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let spec = catalog::find(&payload.assessment_code).ok_or_else(|| {
        AppError::BadRequest(format!("Unknown assessment '{}'", payload.assessment_code))
    })?;
    if spec.subject_name(&payload.subject_code).is_none() {
        return Err(AppError::BadRequest(format!(
            "Assessment '{}' has no subject '{}'",
            spec.code, payload.subject_code
        )));
    }

    let question = sqlx::query_as::<_, Question>(
        r#"
        INSERT INTO questions
            (assessment_code, subject_code, question_type, prompt, passage, image_url,
             option_type, options, correct_answer, explanation)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id, assessment_code, subject_code, question_type, prompt, passage,
                  image_url, option_type, options, correct_answer, explanation, created_at
        "#,
    )
    .bind(spec.code)
    .bind(&payload.subject_code)
    .bind(&payload.question_type)
    .bind(&payload.prompt)
    .bind(&payload.passage)
    .bind(&payload.image_url)
    .bind(&payload.option_type)
    .bind(SqlJson(&payload.options))
    .bind(&payload.correct_answer)
    .bind(&payload.explanation)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(question)))
}

/// Removes a question. Stored results keep their own snapshot of it.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
