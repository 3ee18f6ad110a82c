use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::validate_url_string;

/// Education board categories.
pub const EDUCATION_CATEGORIES: [&str; 5] = ["weight", "rehab", "pila", "guide", "free"];

/// Represents the 'banners' table: rotating dashboard banners.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Banner {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub link_url: String,
    pub position: i32,
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBannerRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(max = 300))]
    pub description: String,
    #[validate(custom(function = validate_url_string))]
    pub image_url: String,
    #[validate(custom(function = validate_url_string))]
    pub link_url: String,
    #[serde(default)]
    pub position: i32,
}

/// Represents the 'education_posts' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EducationPost {
    pub id: i64,
    pub user_id: i64,
    pub author: String,
    pub category: String,
    pub title: String,
    pub content: String,
    pub image_url: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEducationPostRequest {
    #[validate(custom(function = validate_education_category))]
    pub category: String,
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
    /// Representative image; must already be hosted somewhere.
    #[validate(custom(function = validate_url_string))]
    pub image_url: String,
}

#[derive(Debug, Deserialize)]
pub struct EducationListParams {
    pub category: Option<String>,
}

/// Represents the 'education_institutions' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Institution {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub region: Option<String>,
    pub phone: Option<String>,
    pub homepage: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InstitutionSearchParams {
    pub q: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VisitRequest {
    #[validate(length(min = 1, max = 200))]
    pub path: String,
}

/// Visits per day, newest first.
#[derive(Debug, Serialize, FromRow)]
pub struct DailyTraffic {
    pub day: chrono::NaiveDate,
    pub total_visits: i64,
    pub unique_users: i64,
}

fn validate_education_category(category: &str) -> Result<(), validator::ValidationError> {
    if !EDUCATION_CATEGORIES.contains(&category) {
        return Err(validator::ValidationError::new("invalid_category"));
    }
    Ok(())
}
