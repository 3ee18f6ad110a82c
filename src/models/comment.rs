use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// DTO for creating a new comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub content: String,
}

/// DTO for displaying a comment with author info.
#[derive(Debug, Serialize, FromRow)]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub nickname: String,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
