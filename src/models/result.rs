// src/models/result.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use crate::models::question::QuestionSnapshot;

/// How a session came to be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// Submitted by the user with every question answered.
    Completed,
    /// Forced by the countdown reaching zero.
    TimedOut,
    /// The user quit before finishing.
    Aborted,
}

impl ResultStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultStatus::Completed => "completed",
            ResultStatus::TimedOut => "timed_out",
            ResultStatus::Aborted => "aborted",
        }
    }
}

/// Represents the 'quiz_results' table. Written once at submission.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizResult {
    pub id: i64,
    pub user_id: i64,
    pub assessment_code: String,
    /// Correct answers.
    pub score: i32,
    /// Questions in the session; equals the number of result items.
    pub total: i32,
    pub percent: i32,
    pub grade: String,
    pub passed: bool,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'quiz_result_items' table: one row per question of a result.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ResultItem {
    pub id: i64,
    pub result_id: i64,
    /// Zero-based position of the question in the session.
    pub position: i32,
    pub question_id: Option<i64>,
    pub user_answer: Option<String>,
    pub is_correct: bool,
    pub question: Json<QuestionSnapshot>,
}

/// Latest-result summary shown on the dashboard.
#[derive(Debug, Serialize)]
pub struct QuizStatus {
    pub result_id: i64,
    pub assessment_code: String,
    pub title: String,
    pub score: i32,
    pub total: i32,
    pub percent: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One row of an assessment leaderboard.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RankingEntry {
    pub rank: i64,
    pub user_id: i64,
    pub nickname: String,
    pub score: i32,
    pub total: i32,
    pub grade: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Query parameters for result lookups.
#[derive(Debug, Deserialize)]
pub struct ResultFilter {
    /// Restrict to one assessment code.
    pub code: Option<String>,
}
