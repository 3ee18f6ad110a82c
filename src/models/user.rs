// src/models/user.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9+\-\s]{7,20}$").expect("phone pattern is a valid regex")
});

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Login identity, unique.
    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// User role: 'user' or 'admin'.
    pub role: String,

    pub name: Option<String>,

    /// Public display name, unique.
    pub nickname: String,

    pub phone: Option<String>,

    pub bio: Option<String>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Aggregated profile data for the current user.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub posts_count: i64,
    pub results_count: i64,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password length must be between 6 and 128 characters."
    ))]
    pub password: String,
    #[validate(length(
        min = 2,
        max = 20,
        message = "Nickname length must be between 2 and 20 characters."
    ))]
    pub nickname: String,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for editing the caller's own profile. Absent fields are left untouched.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 50))]
    pub name: Option<String>,
    #[validate(length(min = 2, max = 20))]
    pub nickname: Option<String>,
    #[validate(regex(path = *PHONE_RE, message = "Phone number format is invalid."))]
    pub phone: Option<String>,
    #[validate(length(max = 300))]
    pub bio: Option<String>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.nickname.is_none() && self.phone.is_none() && self.bio.is_none()
    }
}
