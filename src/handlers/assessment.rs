// src/handlers/assessment.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;

use crate::{
    error::AppError,
    exam::{
        ExamError, catalog,
        service::{ExamService, StartOptions},
        sheet::Step,
    },
    models::result::{RankingEntry, ResultFilter},
    utils::jwt::{Claims, MaybeClaims},
};

/// Leaderboard size.
const RANKING_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct SelectAnswerRequest {
    pub question_id: i64,
    pub option: String,
}

/// Starts or resumes a session. A saved draft is restored before any new
/// questions are drawn.
pub async fn start_session(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(code): Path<String>,
    Json(options): Json<StartOptions>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let outcome = exams.start(user_id, &code, options).await?;
    Ok(Json(outcome))
}

pub async fn get_session(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let view = exams.view(claims.user_id()?, &code).await?;
    Ok(Json(view))
}

pub async fn select_answer(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(code): Path<String>,
    Json(payload): Json<SelectAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = exams
        .select(claims.user_id()?, &code, payload.question_id, &payload.option)
        .await?;
    Ok(Json(outcome))
}

pub async fn navigate(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(code): Path<String>,
    Json(step): Json<Step>,
) -> Result<impl IntoResponse, AppError> {
    let view = exams.navigate(claims.user_id()?, &code, step).await?;
    Ok(Json(view))
}

/// Temporary save of the running session.
pub async fn save_draft(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let draft = exams.save_draft(claims.user_id()?, &code).await?;

    Ok(Json(json!({
        "saved_at": draft.saved_at,
        "answered": draft.answers.len(),
        "total": draft.question_ids.len(),
    })))
}

pub async fn submit(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let summary = exams.submit(claims.user_id()?, &code).await?;
    Ok(Json(summary))
}

/// Quits the session. What was answered so far is recorded as aborted.
pub async fn abandon(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let summary = exams.abandon(claims.user_id()?, &code).await?;
    Ok(Json(summary))
}

/// Best completed result per user, top ten. A signed-in caller outside the
/// top ten gets their own entry appended.
pub async fn ranking(
    State(pool): State<PgPool>,
    MaybeClaims(claims): MaybeClaims,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let spec = catalog::find(&code).ok_or(ExamError::UnknownAssessment(code.clone()))?;
    let caller = claims.as_ref().map(Claims::user_id).transpose()?;

    let entries = sqlx::query_as::<_, RankingEntry>(
        r#"
        WITH best AS (
            SELECT DISTINCT ON (r.user_id) r.user_id, r.score, r.total, r.grade, r.created_at
            FROM quiz_results r
            WHERE r.assessment_code = $1 AND r.status = 'completed'
            ORDER BY r.user_id, r.score DESC, r.created_at ASC
        ),
        ranked AS (
            SELECT
                ROW_NUMBER() OVER (ORDER BY b.score DESC, b.created_at ASC) AS rank,
                b.user_id, u.nickname, b.score, b.total, b.grade, b.created_at
            FROM best b
            JOIN users u ON u.id = b.user_id
        )
        SELECT rank, user_id, nickname, score, total, grade, created_at
        FROM ranked
        WHERE rank <= $2 OR user_id = $3
        ORDER BY rank
        "#,
    )
    .bind(spec.code)
    .bind(RANKING_LIMIT)
    .bind(caller)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to load ranking for '{}': {:?}", spec.code, e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(entries))
}

/// Full review of one result: per-subject breakdown and every question with
/// the caller's answer, the correct answer and the explanation.
pub async fn get_result(
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let view = exams.view_result(claims.user_id()?, id).await?;
    Ok(Json(view))
}

/// The caller's newest result, optionally for one assessment.
pub async fn latest_result(
    State(pool): State<PgPool>,
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<ResultFilter>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let (result_id,): (i64,) = sqlx::query_as(
        r#"
        SELECT id FROM quiz_results
        WHERE user_id = $1 AND ($2::TEXT IS NULL OR assessment_code = $2)
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(filter.code)
    .fetch_optional(&pool)
    .await?
    .ok_or(ExamError::ResultNotFound)?;

    let view = exams.view_result(user_id, result_id).await?;
    Ok(Json(view))
}
