// src/store/mod.rs

//! Persistence seam for the assessment flow.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgExamStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    exam::{AnswerMap, catalog::QuestionOrder},
    models::{
        question::{Question, QuestionSnapshot},
        result::{QuizResult, ResultItem, ResultStatus},
    },
};

pub(crate) const ALREADY_RECORDED: &str = "This attempt has already been recorded";

/// What to draw for a fresh session.
#[derive(Debug, Clone)]
pub struct QuestionQuery {
    pub assessment_code: &'static str,
    /// Subjects in the order they should appear.
    pub subjects: Vec<&'static str>,
    pub per_subject_limit: Option<u32>,
    pub order: QuestionOrder,
}

/// Saved progress; at most one per user and assessment.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub user_id: i64,
    pub assessment_code: String,
    pub question_ids: Vec<i64>,
    pub answers: AnswerMap,
    pub current_index: usize,
    pub time_limit_secs: u32,
    pub started_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
    /// Correctness is shown as each answer is picked.
    pub reveal_answers: bool,
}

#[derive(Debug, Clone)]
pub struct NewResult {
    pub user_id: i64,
    pub assessment_code: String,
    pub score: i32,
    pub total: i32,
    pub percent: i32,
    pub grade: String,
    pub passed: bool,
    pub status: ResultStatus,
    pub items: Vec<NewResultItem>,
    /// `started_at` of the draft the attempt was restored from. The result is
    /// only written if that draft is still stored, so an attempt restored by
    /// two callers is recorded once.
    pub restored_from: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewResultItem {
    pub position: i32,
    pub question_id: i64,
    pub user_answer: Option<String>,
    pub is_correct: bool,
    pub question: QuestionSnapshot,
}

#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub result: QuizResult,
    /// Ordered by position.
    pub items: Vec<ResultItem>,
}

#[async_trait]
pub trait ExamStore: Send + Sync {
    async fn draw_questions(&self, query: &QuestionQuery) -> Result<Vec<Question>, AppError>;

    /// Loads questions in the order of `ids`. Ids that no longer exist are skipped.
    async fn questions_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>, AppError>;

    async fn find_draft(&self, user_id: i64, assessment_code: &str) -> Result<Option<Draft>, AppError>;

    async fn upsert_draft(&self, draft: &Draft) -> Result<(), AppError>;

    /// Writes the result with all of its items and removes the user's draft
    /// for the same assessment, atomically. Returns the new result id.
    ///
    /// Fails with `AppError::Conflict` when `restored_from` is set and the
    /// matching draft has already been consumed.
    async fn record_result(&self, result: &NewResult) -> Result<i64, AppError>;

    async fn find_result(&self, result_id: i64) -> Result<Option<ResultRecord>, AppError>;
}
