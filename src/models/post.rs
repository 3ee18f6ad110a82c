use std::cmp::Reverse;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::reaction::ReactionKind;

/// Board categories a post may be filed under.
pub const POST_CATEGORIES: [&str; 3] = ["free", "question", "info"];

/// How many of the most viewed posts are considered for the hot list.
pub const HOT_CANDIDATES: i64 = 50;
/// How many hot posts are returned.
pub const HOT_LIMIT: usize = 10;

/// Represents the 'posts' table joined with the author's nickname.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub author: String,
    pub category: String,
    pub title: String,
    pub content: String,
    pub views: i32,
    pub likes: i32,
    pub dislikes: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Post detail with the caller's own reaction, if any.
#[derive(Debug, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub my_reaction: Option<ReactionKind>,
}

/// Row used for hot post ranking.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HotPost {
    pub id: i64,
    pub title: String,
    pub views: i32,
    pub likes: i32,
    pub dislikes: i32,
    #[sqlx(skip)]
    pub score: i64,
}

/// Popularity score: views count once, likes three times, dislikes subtract two.
pub fn hot_score(views: i32, likes: i32, dislikes: i32) -> i64 {
    views as i64 + likes as i64 * 3 - dislikes as i64 * 2
}

/// Scores the candidates and keeps the top `HOT_LIMIT`.
/// Ties go to the more viewed post, then the newer one.
pub fn rank_hot(mut candidates: Vec<HotPost>) -> Vec<HotPost> {
    for post in &mut candidates {
        post.score = hot_score(post.views, post.likes, post.dislikes);
    }
    candidates.sort_by_key(|p| (Reverse(p.score), Reverse(p.views), Reverse(p.id)));
    candidates.truncate(HOT_LIMIT);
    candidates
}

/// DTO for creating a new post.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(custom(function = validate_category))]
    pub category: String,

    #[validate(length(
        min = 1,
        max = 100,
        message = "Title length must be between 1 and 100 chars"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 10000,
        message = "Content length must be between 1 and 10000 chars"
    ))]
    pub content: String,
}

/// DTO for editing a post. Absent fields are left untouched.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(custom(function = validate_category))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 10000))]
    pub content: Option<String>,
}

/// Query parameters for listing posts.
#[derive(Debug, Deserialize)]
pub struct PostListParams {
    /// 'all' or absent lists every category.
    pub category: Option<String>,

    /// Cursor for pagination: the created_at timestamp of the last post in the previous page.
    pub cursor: Option<chrono::DateTime<chrono::Utc>>,

    /// Number of items to return (default: 20, max: 100).
    pub limit: Option<i64>,
}

impl PostListParams {
    pub fn category_filter(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| *c != "all")
    }

    pub fn page_size(&self) -> i64 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }
}

fn validate_category(category: &str) -> Result<(), validator::ValidationError> {
    if !POST_CATEGORIES.contains(&category) {
        return Err(validator::ValidationError::new("invalid_category"));
    }
    Ok(())
}
