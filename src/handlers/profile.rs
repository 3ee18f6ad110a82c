// src/handlers/profile.rs

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::{AppError, conflict_or_internal},
    exam::service::ExamService,
    models::{
        post::{Post, PostListParams},
        result::{QuizResult, ResultFilter},
        user::{MeResponse, UpdateProfileRequest, User},
    },
    utils::jwt::Claims,
};

const USER_COLUMNS: &str = "id, email, password, role, name, nickname, phone, bio, created_at";

async fn load_user(pool: &PgPool, user_id: i64) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))
}

/// Get current user's profile and statistics.
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let user = load_user(&pool, user_id).await?;

    let (posts_count, results_count): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM posts WHERE user_id = $1),
            (SELECT COUNT(*) FROM quiz_results WHERE user_id = $1)
        "#,
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(MeResponse {
        user,
        posts_count,
        results_count,
    }))
}

/// Edits name, nickname, phone or bio. Only the fields present are written.
pub async fn update_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.user_id()?;

    if payload.is_empty() {
        return Ok(Json(load_user(&pool, user_id).await?));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    if let Some(name) = &payload.name {
        separated.push("name = ");
        separated.push_bind_unseparated(name.trim());
    }
    if let Some(nickname) = &payload.nickname {
        separated.push("nickname = ");
        separated.push_bind_unseparated(nickname.trim());
    }
    if let Some(phone) = &payload.phone {
        separated.push("phone = ");
        separated.push_bind_unseparated(phone.trim());
    }
    if let Some(bio) = &payload.bio {
        separated.push("bio = ");
        separated.push_bind_unseparated(bio);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(user_id);
    builder.push(format!(" RETURNING {USER_COLUMNS}"));

    let user = builder
        .build_query_as::<User>()
        .fetch_optional(&pool)
        .await
        .map_err(|e| conflict_or_internal(e, "Nickname is already in use"))?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Deletes the caller's account. Posts, reactions, comments, drafts and
/// results go with it.
pub async fn delete_me(
    State(pool): State<PgPool>,
    State(exams): State<ExamService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    exams.evict_user(user_id).await;
    tracing::info!("User {} deleted their account", user_id);
    Ok(StatusCode::NO_CONTENT)
}

/// List posts created by the current user.
pub async fn list_my_posts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT
            p.id, p.user_id, u.nickname AS author, p.category, p.title, p.content,
            p.views, p.likes, p.dislikes, p.created_at, p.updated_at
        FROM posts p
        JOIN users u ON u.id = p.user_id
        WHERE p.user_id = $1
          AND ($2::TIMESTAMPTZ IS NULL OR p.created_at < $2)
        ORDER BY p.created_at DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(params.cursor)
    .bind(params.page_size())
    .fetch_all(&pool)
    .await?;

    Ok(Json(posts))
}

/// List the current user's assessment results, newest first.
pub async fn list_my_results(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<ResultFilter>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let results = sqlx::query_as::<_, QuizResult>(
        r#"
        SELECT id, user_id, assessment_code, score, total, percent, grade, passed, status, created_at
        FROM quiz_results
        WHERE user_id = $1
          AND ($2::TEXT IS NULL OR assessment_code = $2)
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(filter.code)
    .fetch_all(&pool)
    .await?;

    Ok(Json(results))
}
