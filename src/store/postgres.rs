// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, types::Json};

use crate::{
    error::AppError,
    exam::{AnswerMap, catalog::QuestionOrder},
    models::{
        question::Question,
        result::{QuizResult, ResultItem},
    },
    store::{ALREADY_RECORDED, Draft, ExamStore, NewResult, QuestionQuery, ResultRecord},
};

const QUESTION_COLUMNS: &str = "id, assessment_code, subject_code, question_type, prompt, passage, \
     image_url, option_type, options, correct_answer, explanation, created_at";

#[derive(Clone)]
pub struct PgExamStore {
    pool: PgPool,
}

impl PgExamStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct DraftRow {
    user_id: i64,
    assessment_code: String,
    question_ids: Json<Vec<i64>>,
    answers: Json<AnswerMap>,
    current_index: i32,
    time_limit_secs: i32,
    started_at: chrono::DateTime<chrono::Utc>,
    saved_at: chrono::DateTime<chrono::Utc>,
    reveal_answers: bool,
}

impl From<DraftRow> for Draft {
    fn from(row: DraftRow) -> Self {
        Self {
            user_id: row.user_id,
            assessment_code: row.assessment_code,
            question_ids: row.question_ids.0,
            answers: row.answers.0,
            current_index: row.current_index.max(0) as usize,
            time_limit_secs: row.time_limit_secs.max(0) as u32,
            started_at: row.started_at,
            saved_at: row.saved_at,
            reveal_answers: row.reveal_answers,
        }
    }
}

fn internal(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        tracing::error!("{}: {:?}", context, e);
        AppError::InternalServerError(e.to_string())
    }
}

#[async_trait]
impl ExamStore for PgExamStore {
    async fn draw_questions(&self, query: &QuestionQuery) -> Result<Vec<Question>, AppError> {
        let order_by = match query.order {
            QuestionOrder::Authored => "id",
            QuestionOrder::Random => "RANDOM()",
        };
        let sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions \
             WHERE assessment_code = $1 AND subject_code = $2 \
             ORDER BY {order_by} LIMIT $3"
        );
        // LIMIT NULL is no limit.
        let limit = query.per_subject_limit.map(i64::from);

        let mut questions = Vec::new();
        for subject in &query.subjects {
            let mut batch = sqlx::query_as::<_, Question>(&sql)
                .bind(query.assessment_code)
                .bind(*subject)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
                .map_err(internal("Failed to draw questions"))?;
            questions.append(&mut batch);
        }
        Ok(questions)
    }

    async fn questions_by_ids(&self, ids: &[i64]) -> Result<Vec<Question>, AppError> {
        let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ANY($1)");
        let mut found = sqlx::query_as::<_, Question>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(internal("Failed to load questions"))?;

        let mut ordered = Vec::with_capacity(found.len());
        for id in ids {
            if let Some(pos) = found.iter().position(|q| q.id == *id) {
                ordered.push(found.swap_remove(pos));
            }
        }
        Ok(ordered)
    }

    async fn find_draft(&self, user_id: i64, assessment_code: &str) -> Result<Option<Draft>, AppError> {
        let row = sqlx::query_as::<_, DraftRow>(
            r#"
            SELECT user_id, assessment_code, question_ids, answers, current_index,
                   time_limit_secs, started_at, saved_at, reveal_answers
            FROM exam_drafts
            WHERE user_id = $1 AND assessment_code = $2
            "#,
        )
        .bind(user_id)
        .bind(assessment_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal("Failed to load draft"))?;

        Ok(row.map(Draft::from))
    }

    async fn upsert_draft(&self, draft: &Draft) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO exam_drafts
                (user_id, assessment_code, question_ids, answers, current_index,
                 time_limit_secs, started_at, saved_at, reveal_answers)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id, assessment_code) DO UPDATE SET
                question_ids = EXCLUDED.question_ids,
                answers = EXCLUDED.answers,
                current_index = EXCLUDED.current_index,
                time_limit_secs = EXCLUDED.time_limit_secs,
                started_at = EXCLUDED.started_at,
                saved_at = EXCLUDED.saved_at,
                reveal_answers = EXCLUDED.reveal_answers
            "#,
        )
        .bind(draft.user_id)
        .bind(&draft.assessment_code)
        .bind(Json(&draft.question_ids))
        .bind(Json(&draft.answers))
        .bind(draft.current_index as i32)
        .bind(draft.time_limit_secs as i32)
        .bind(draft.started_at)
        .bind(draft.saved_at)
        .bind(draft.reveal_answers)
        .execute(&self.pool)
        .await
        .map_err(internal("Failed to save draft"))?;

        Ok(())
    }

    async fn record_result(&self, result: &NewResult) -> Result<i64, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(internal("Failed to begin transaction"))?;

        // Deleting first takes the draft row lock; a second writer restored
        // from the same draft blocks here, then clears nothing.
        let cleared = sqlx::query(
            r#"
            DELETE FROM exam_drafts
            WHERE user_id = $1 AND assessment_code = $2
              AND ($3::TIMESTAMPTZ IS NULL OR started_at = $3)
            "#,
        )
        .bind(result.user_id)
        .bind(&result.assessment_code)
        .bind(result.restored_from)
        .execute(&mut *tx)
        .await
        .map_err(internal("Failed to clear draft"))?;

        if result.restored_from.is_some() && cleared.rows_affected() == 0 {
            tracing::warn!(
                "Draft for user {} on '{}' was already consumed; not recording again",
                result.user_id,
                result.assessment_code
            );
            return Err(AppError::Conflict(ALREADY_RECORDED.to_string()));
        }

        let (result_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO quiz_results
                (user_id, assessment_code, score, total, percent, grade, passed, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(result.user_id)
        .bind(&result.assessment_code)
        .bind(result.score)
        .bind(result.total)
        .bind(result.percent)
        .bind(&result.grade)
        .bind(result.passed)
        .bind(result.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(internal("Failed to insert result"))?;

        if !result.items.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO quiz_result_items \
                 (result_id, position, question_id, user_answer, is_correct, question) ",
            );
            builder.push_values(&result.items, |mut row, item| {
                row.push_bind(result_id)
                    .push_bind(item.position)
                    .push_bind(item.question_id)
                    .push_bind(item.user_answer.as_deref())
                    .push_bind(item.is_correct)
                    .push_bind(Json(&item.question));
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(internal("Failed to insert result items"))?;
        }

        tx.commit()
            .await
            .map_err(internal("Failed to commit result"))?;

        Ok(result_id)
    }

    async fn find_result(&self, result_id: i64) -> Result<Option<ResultRecord>, AppError> {
        let result = sqlx::query_as::<_, QuizResult>(
            r#"
            SELECT id, user_id, assessment_code, score, total, percent, grade, passed, status, created_at
            FROM quiz_results
            WHERE id = $1
            "#,
        )
        .bind(result_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal("Failed to load result"))?;

        let Some(result) = result else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, ResultItem>(
            r#"
            SELECT id, result_id, position, question_id, user_answer, is_correct, question
            FROM quiz_result_items
            WHERE result_id = $1
            ORDER BY position
            "#,
        )
        .bind(result_id)
        .fetch_all(&self.pool)
        .await
        .map_err(internal("Failed to load result items"))?;

        Ok(Some(ResultRecord { result, items }))
    }
}
