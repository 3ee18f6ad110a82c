// src/store/memory.rs

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use sqlx::types::Json;
use tokio::sync::RwLock;

use crate::{
    error::AppError,
    models::{
        question::Question,
        result::{QuizResult, ResultItem},
    },
    store::{ALREADY_RECORDED, Draft, ExamStore, NewResult, QuestionQuery, ResultRecord},
};

#[derive(Default)]
struct Tables {
    questions: Vec<Question>,
    drafts: HashMap<(i64, String), Draft>,
    results: Vec<ResultRecord>,
    next_item_id: i64,
}

/// In-process store for tests and database-less runs.
///
/// Random ordering is not applied: questions always come back in authored
/// order so runs are reproducible.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_questions(questions: Vec<Question>) -> Self {
        Self {
            tables: RwLock::new(Tables {
                questions,
                ..Tables::default()
            }),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Makes `record_result` and `upsert_draft` fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn results_for(&self, user_id: i64) -> Vec<ResultRecord> {
        self.tables
            .read()
            .await
            .results
            .iter()
            .filter(|r| r.result.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn remove_question(&self, question_id: i64) {
        self.tables
            .write()
            .await
            .questions
            .retain(|q| q.id != question_id);
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::InternalServerError(
                "memory store is refusing writes".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn draw_questions(&self, query: &QuestionQuery) -> Result<Vec<Question>, AppError> {
        let tables = self.tables.read().await;
        let mut drawn = Vec::new();
        for subject in &query.subjects {
            let mut matching: Vec<&Question> = tables
                .questions
                .iter()
                .filter(|q| q.assessment_code == query.assessment_code && q.subject_code == *subject)
                .collect();
            matching.sort_by_key(|q| q.id);
            let limit = query.per_subject_limit.map_or(usize::MAX, |n| n as usize);
            drawn.extend(matching.into_iter().take(limit).cloned());
        }
        Ok(drawn)
    }

    async fn questions_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>, AppError> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.questions.iter().find(|q| q.id == *id).cloned())
            .collect())
    }

    async fn find_draft(&self, user_id: i64, assessment_code: &str) -> Result<Option<Draft>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .drafts
            .get(&(user_id, assessment_code.to_string()))
            .cloned())
    }

    async fn upsert_draft(&self, draft: &Draft) -> Result<(), AppError> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        tables.drafts.insert(
            (draft.user_id, draft.assessment_code.clone()),
            draft.clone(),
        );
        Ok(())
    }

    async fn record_result(&self, new: &NewResult) -> Result<i64, AppError> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let draft_key = (new.user_id, new.assessment_code.clone());

        if let Some(started_at) = new.restored_from {
            let still_stored = tables
                .drafts
                .get(&draft_key)
                .is_some_and(|draft| draft.started_at == started_at);
            if !still_stored {
                return Err(AppError::Conflict(ALREADY_RECORDED.to_string()));
            }
        }

        let result_id = tables.results.len() as i64 + 1;
        let mut items = Vec::with_capacity(new.items.len());
        for item in &new.items {
            tables.next_item_id += 1;
            items.push(ResultItem {
                id: tables.next_item_id,
                result_id,
                position: item.position,
                question_id: Some(item.question_id),
                user_answer: item.user_answer.clone(),
                is_correct: item.is_correct,
                question: Json(item.question.clone()),
            });
        }

        tables.results.push(ResultRecord {
            result: QuizResult {
                id: result_id,
                user_id: new.user_id,
                assessment_code: new.assessment_code.clone(),
                score: new.score,
                total: new.total,
                percent: new.percent,
                grade: new.grade.clone(),
                passed: new.passed,
                status: new.status.as_str().to_string(),
                created_at: chrono::Utc::now(),
            },
            items,
        });
        tables.drafts.remove(&draft_key);

        Ok(result_id)
    }

    async fn find_result(&self, result_id: i64) -> Result<Option<ResultRecord>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .results
            .iter()
            .find(|r| r.result.id == result_id)
            .cloned())
    }
}
