// src/handlers/community.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        post::{
            CreatePostRequest, HOT_CANDIDATES, HotPost, Post, PostDetail, PostListParams,
            UpdatePostRequest, rank_hot,
        },
        reaction::ReactionKind,
    },
    utils::{
        html::clean_html,
        jwt::{Claims, MaybeClaims},
    },
};

/// Header carrying a client-generated id for anonymous view counting.
pub const ANONYMOUS_ID_HEADER: &str = "x-anonymous-id";

const POST_SELECT: &str = r#"
    SELECT
        p.id, p.user_id, u.nickname AS author, p.category, p.title, p.content,
        p.views, p.likes, p.dislikes, p.created_at, p.updated_at
    FROM posts p
    JOIN users u ON u.id = p.user_id
"#;

async fn fetch_post(pool: &PgPool, id: i64) -> Result<Post, AppError> {
    sqlx::query_as::<_, Post>(&format!("{POST_SELECT} WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or(AppError::NotFound("Post not found".to_string()))
}

/// Create a new post.
pub async fn create_post(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.user_id()?;

    let (post_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO posts (user_id, category, title, content)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(&payload.category)
    .bind(payload.title.trim())
    .bind(clean_html(&payload.content))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create post: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(fetch_post(&pool, post_id).await?)))
}

/// List posts, newest first, optionally filtered by category.
/// Supports cursor-based pagination.
pub async fn list_posts(
    State(pool): State<PgPool>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let posts = sqlx::query_as::<_, Post>(&format!(
        r#"{POST_SELECT}
        WHERE ($1::TEXT IS NULL OR p.category = $1)
          AND ($2::TIMESTAMPTZ IS NULL OR p.created_at < $2)
        ORDER BY p.created_at DESC
        LIMIT $3
        "#
    ))
    .bind(params.category_filter())
    .bind(params.cursor)
    .bind(params.page_size())
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list posts: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(posts))
}

/// Hot posts: the most viewed candidates re-ranked by engagement score.
pub async fn hot_posts(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let candidates = sqlx::query_as::<_, HotPost>(
        r#"
        SELECT id, title, views, likes, dislikes
        FROM posts
        ORDER BY views DESC, id DESC
        LIMIT $1
        "#,
    )
    .bind(HOT_CANDIDATES)
    .fetch_all(&pool)
    .await?;

    Ok(Json(rank_hot(candidates)))
}

/// Get a single post and record a view.
///
/// Signed-in callers are counted by user id, anonymous callers by the
/// `X-Anonymous-Id` header; each viewer is counted once per post.
pub async fn get_post(
    State(pool): State<PgPool>,
    MaybeClaims(claims): MaybeClaims,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.as_ref().map(Claims::user_id).transpose()?;

    let viewer = match user_id {
        Some(user_id) => Some(format!("user:{}", user_id)),
        None => headers
            .get(ANONYMOUS_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty() && value.len() <= 100)
            .map(|value| format!("anon:{}", value)),
    };

    if let Some(viewer) = viewer {
        record_view(&pool, id, &viewer).await?;
    }

    let post = fetch_post(&pool, id).await?;

    let my_reaction = match user_id {
        Some(user_id) => sqlx::query_as::<_, (String,)>(
            "SELECT reaction_type FROM post_reactions WHERE post_id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&pool)
        .await?
        .and_then(|(kind,)| ReactionKind::parse(&kind)),
        None => None,
    };

    Ok(Json(PostDetail { post, my_reaction }))
}

async fn record_view(pool: &PgPool, post_id: i64, viewer: &str) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO post_views (post_id, viewer)
        SELECT $1, $2 WHERE EXISTS (SELECT 1 FROM posts WHERE id = $1)
        ON CONFLICT (post_id, viewer) DO NOTHING
        "#,
    )
    .bind(post_id)
    .bind(viewer)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted > 0 {
        sqlx::query("UPDATE posts SET views = views + 1 WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Edit a post. Author only.
pub async fn update_post(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.user_id()?;

    let post = fetch_post(&pool, id).await?;
    if post.user_id != user_id {
        return Err(AppError::Forbidden(
            "Only the author can edit this post".to_string(),
        ));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE posts SET updated_at = NOW()");

    if let Some(category) = &payload.category {
        builder.push(", category = ");
        builder.push_bind(category);
    }
    if let Some(title) = &payload.title {
        builder.push(", title = ");
        builder.push_bind(title.trim());
    }
    if let Some(content) = &payload.content {
        builder.push(", content = ");
        builder.push_bind(clean_html(content));
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update post {}: {:?}", id, e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(fetch_post(&pool, id).await?))
}

/// Delete a post. Author or admin.
pub async fn delete_post(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let (author_id,): (i64,) = sqlx::query_as("SELECT user_id FROM posts WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    if author_id != user_id && !claims.is_admin() {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this post".to_string(),
        ));
    }

    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete post: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(StatusCode::NO_CONTENT)
}
