// src/handlers/interaction.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        comment::{CommentResponse, CreateCommentRequest},
        reaction::{ReactRequest, ReactionKind, ReactionState, ReactionWrite, toggle},
    },
    utils::{html::clean_html, jwt::Claims},
};

/// Press the like or dislike button on a post.
///
/// Pressing the active reaction clears it, pressing the other one switches.
/// The reaction row and the post counters change in one transaction.
pub async fn react(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
    Json(payload): Json<ReactRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    // Row lock on the post serialises concurrent presses by the same user.
    sqlx::query("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))?;

    let current = sqlx::query_as::<_, (String,)>(
        "SELECT reaction_type FROM post_reactions WHERE post_id = $1 AND user_id = $2",
    )
    .bind(post_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .and_then(|(kind,)| ReactionKind::parse(&kind));

    let change = toggle(current, payload.reaction);

    match change.write {
        ReactionWrite::Insert(kind) => {
            sqlx::query(
                "INSERT INTO post_reactions (post_id, user_id, reaction_type) VALUES ($1, $2, $3)",
            )
            .bind(post_id)
            .bind(user_id)
            .bind(kind.as_str())
            .execute(&mut *tx)
            .await?;
        }
        ReactionWrite::Update(kind) => {
            sqlx::query(
                "UPDATE post_reactions SET reaction_type = $3, created_at = NOW() \
                 WHERE post_id = $1 AND user_id = $2",
            )
            .bind(post_id)
            .bind(user_id)
            .bind(kind.as_str())
            .execute(&mut *tx)
            .await?;
        }
        ReactionWrite::Delete => {
            sqlx::query("DELETE FROM post_reactions WHERE post_id = $1 AND user_id = $2")
                .bind(post_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    let (likes, dislikes): (i32, i32) = sqlx::query_as(
        r#"
        UPDATE posts
        SET likes = GREATEST(0, likes + $2), dislikes = GREATEST(0, dislikes + $3)
        WHERE id = $1
        RETURNING likes, dislikes
        "#,
    )
    .bind(post_id)
    .bind(change.like_delta)
    .bind(change.dislike_delta)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(ReactionState {
        reaction: change.next,
        likes,
        dislikes,
    }))
}

/// Create a new comment.
pub async fn create_comment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.user_id()?;

    let comment = sqlx::query_as::<_, CommentResponse>(
        r#"
        WITH inserted AS (
            INSERT INTO comments (post_id, user_id, content)
            SELECT $1, $2, $3 WHERE EXISTS (SELECT 1 FROM posts WHERE id = $1)
            RETURNING id, post_id, user_id, content, created_at
        )
        SELECT i.id, i.post_id, i.user_id, u.nickname, i.content, i.created_at
        FROM inserted i
        JOIN users u ON u.id = i.user_id
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(clean_html(&payload.content))
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Post not found".to_string()))?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// List comments for a post, newest first.
pub async fn list_comments(
    State(pool): State<PgPool>,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let comments = sqlx::query_as::<_, CommentResponse>(
        r#"
        SELECT c.id, c.post_id, c.user_id, u.nickname, c.content, c.created_at
        FROM comments c
        JOIN users u ON c.user_id = u.id
        WHERE c.post_id = $1
        ORDER BY c.created_at DESC, c.id DESC
        "#,
    )
    .bind(post_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(comments))
}
