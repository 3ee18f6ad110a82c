// src/handlers/dashboard.rs

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use serde::Serialize;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    exam::catalog::{self, AssessmentKind, Subject, Timing},
    models::{
        dashboard::{
            Banner, CreateEducationPostRequest, EDUCATION_CATEGORIES, EducationListParams,
            EducationPost, Institution, InstitutionSearchParams, VisitRequest,
        },
        result::{QuizResult, QuizStatus},
    },
    utils::{
        html::clean_html,
        jwt::{Claims, MaybeClaims},
    },
};

/// Active banners in display order.
pub async fn list_banners(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let banners = sqlx::query_as::<_, Banner>(
        r#"
        SELECT id, title, description, image_url, link_url, position, is_active
        FROM banners
        WHERE is_active
        ORDER BY position, id
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(banners))
}

/// The caller's most recent assessment result, or `null`.
pub async fn quiz_status(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let latest = sqlx::query_as::<_, QuizResult>(
        r#"
        SELECT id, user_id, assessment_code, score, total, percent, grade, passed, status, created_at
        FROM quiz_results
        WHERE user_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?;

    let status = latest.map(|result| QuizStatus {
        title: catalog::find(&result.assessment_code)
            .map(|spec| spec.title.to_string())
            .unwrap_or_else(|| result.assessment_code.clone()),
        result_id: result.id,
        assessment_code: result.assessment_code,
        score: result.score,
        total: result.total,
        percent: result.percent,
        created_at: result.created_at,
    });

    Ok(Json(status))
}

#[derive(Serialize)]
pub struct CatalogEntry {
    code: &'static str,
    title: &'static str,
    kind: AssessmentKind,
    subjects: &'static [Subject],
    timing: Timing,
    per_subject_limit: Option<u32>,
}

/// Assessments a user can start.
pub async fn list_assessments() -> impl IntoResponse {
    let entries: Vec<CatalogEntry> = catalog::CATALOG
        .iter()
        .map(|spec| CatalogEntry {
            code: spec.code,
            title: spec.title,
            kind: spec.kind,
            subjects: spec.subjects,
            timing: spec.timing,
            per_subject_limit: spec.per_subject_limit,
        })
        .collect();

    Json(entries)
}

/// Education board, newest first.
pub async fn list_education(
    State(pool): State<PgPool>,
    Query(params): Query<EducationListParams>,
) -> Result<impl IntoResponse, AppError> {
    let category = params.category.as_deref().filter(|c| *c != "all");
    if let Some(category) = category {
        if !EDUCATION_CATEGORIES.contains(&category) {
            return Err(AppError::BadRequest(format!("Unknown category '{}'", category)));
        }
    }

    let posts = sqlx::query_as::<_, EducationPost>(
        r#"
        SELECT e.id, e.user_id, u.nickname AS author, e.category, e.title, e.content,
               e.image_url, e.created_at
        FROM education_posts e
        JOIN users u ON u.id = e.user_id
        WHERE ($1::TEXT IS NULL OR e.category = $1)
        ORDER BY e.created_at DESC
        "#,
    )
    .bind(category)
    .fetch_all(&pool)
    .await?;

    Ok(Json(posts))
}

pub async fn create_education_post(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateEducationPostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.user_id()?;

    let post = sqlx::query_as::<_, EducationPost>(
        r#"
        WITH inserted AS (
            INSERT INTO education_posts (user_id, category, title, content, image_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, category, title, content, image_url, created_at
        )
        SELECT i.id, i.user_id, u.nickname AS author, i.category, i.title, i.content,
               i.image_url, i.created_at
        FROM inserted i
        JOIN users u ON u.id = i.user_id
        "#,
    )
    .bind(user_id)
    .bind(&payload.category)
    .bind(payload.title.trim())
    .bind(clean_html(&payload.content))
    .bind(&payload.image_url)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create education post: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(post)))
}

/// Institution search by partial name and category.
pub async fn search_institutions(
    State(pool): State<PgPool>,
    Query(params): Query<InstitutionSearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let pattern = |raw: &Option<String>| {
        raw.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")))
    };

    let institutions = sqlx::query_as::<_, Institution>(
        r#"
        SELECT id, name, category, region, phone, homepage
        FROM education_institutions
        WHERE ($1::TEXT IS NULL OR name ILIKE $1)
          AND ($2::TEXT IS NULL OR category ILIKE $2)
        ORDER BY name
        LIMIT 100
        "#,
    )
    .bind(pattern(&params.q))
    .bind(pattern(&params.category))
    .fetch_all(&pool)
    .await?;

    Ok(Json(institutions))
}

/// Records a page view for the traffic report.
pub async fn record_visit(
    State(pool): State<PgPool>,
    MaybeClaims(claims): MaybeClaims,
    headers: HeaderMap,
    Json(payload): Json<VisitRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.as_ref().map(Claims::user_id).transpose()?;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.chars().take(500).collect::<String>());

    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    sqlx::query(
        "INSERT INTO page_views (path, user_agent, ip_address, user_id) VALUES ($1, $2, $3, $4)",
    )
    .bind(&payload.path)
    .bind(user_agent)
    .bind(ip_address)
    .bind(user_id)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::warn!("Failed to record visit to {}: {:?}", payload.path, e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(StatusCode::NO_CONTENT)
}
