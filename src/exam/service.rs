// src/exam/service.rs

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Weak},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    exam::{
        AnswerMap, ExamError,
        catalog::{self, AssessmentKind, AssessmentSpec},
        scoring::{self, SubjectScore},
        sheet::{AnswerSheet, Selection, Step},
        timer::{Countdown, Tick, TimerGuard},
    },
    models::{
        question::{PublicQuestion, Question, QuestionSnapshot},
        result::{QuizResult, ResultItem, ResultStatus},
    },
    store::{Draft, ExamStore, NewResult, NewResultItem, QuestionQuery},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SessionKey {
    user_id: i64,
    code: &'static str,
}

/// How a session is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    /// The user pressed submit. Requires every question answered unless the
    /// time is already up.
    Manual,
    TimedOut,
    Aborted,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartOptions {
    /// Subset of subjects to draw from; all when empty.
    #[serde(default)]
    pub subjects: Option<Vec<String>>,
    pub seconds_per_question: Option<u32>,
    /// Show correctness as each answer is picked. Quizzes only; a revealed
    /// answer cannot be changed.
    #[serde(default)]
    pub reveal_answers: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerFeedback {
    pub question_id: i64,
    pub is_correct: bool,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

impl AnswerFeedback {
    fn new(question: &Question, option: &str) -> Self {
        Self {
            question_id: question.id,
            is_correct: question.correct_answer == option,
            correct_answer: question.correct_answer.clone(),
            explanation: question.explanation.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub assessment_code: &'static str,
    pub title: &'static str,
    pub kind: AssessmentKind,
    pub questions: Vec<PublicQuestion>,
    pub current_index: usize,
    pub answers: AnswerMap,
    pub answered_count: usize,
    pub total: usize,
    pub time_limit_secs: u32,
    pub remaining_secs: u32,
    pub started_at: DateTime<Utc>,
    /// True when the session was rebuilt from a saved draft.
    pub restored: bool,
    pub reveal_answers: bool,
    /// Correctness of the answers given so far, when revealed.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub feedback: BTreeMap<i64, AnswerFeedback>,
}

#[derive(Debug, Serialize)]
pub struct SelectOutcome {
    pub selection: Selection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<AnswerFeedback>,
    pub session: SessionView,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionSummary {
    pub result_id: i64,
    pub assessment_code: &'static str,
    pub status: ResultStatus,
    pub score: u32,
    pub total: u32,
    pub percent: u32,
    pub grade: &'static str,
    pub passed: bool,
    pub subjects: Vec<SubjectScore>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StartOutcome {
    Active(SessionView),
    /// A saved draft ran out of time while away and was scored on reopening.
    Finished(SubmissionSummary),
}

#[derive(Debug, Serialize)]
pub struct ResultView {
    #[serde(flatten)]
    pub result: QuizResult,
    pub title: String,
    pub subjects: Vec<SubjectScore>,
    pub items: Vec<ResultItem>,
}

#[derive(Debug)]
struct ActiveSession {
    spec: &'static AssessmentSpec,
    sheet: AnswerSheet,
    countdown: Countdown,
    time_limit_secs: u32,
    started_at: DateTime<Utc>,
    restored: bool,
    reveal: bool,
    submitted: bool,
    timer: Option<TimerGuard>,
}

impl ActiveSession {
    fn ensure_open(&self) -> Result<(), ExamError> {
        if self.submitted || self.countdown.is_over() {
            return Err(ExamError::SessionClosed);
        }
        Ok(())
    }

    fn view(&self) -> SessionView {
        SessionView {
            assessment_code: self.spec.code,
            title: self.spec.title,
            kind: self.spec.kind,
            questions: self.sheet.questions().iter().map(PublicQuestion::from).collect(),
            current_index: self.sheet.current_index(),
            answers: self.sheet.answers().clone(),
            answered_count: self.sheet.answered_count(),
            total: self.sheet.questions().len(),
            time_limit_secs: self.time_limit_secs,
            remaining_secs: self.countdown.remaining(),
            started_at: self.started_at,
            restored: self.restored,
            reveal_answers: self.reveal,
            feedback: self.feedback(),
        }
    }

    fn feedback(&self) -> BTreeMap<i64, AnswerFeedback> {
        if !self.reveal {
            return BTreeMap::new();
        }
        self.sheet
            .answers()
            .iter()
            .filter_map(|(id, option)| {
                let question = self.sheet.question(*id)?;
                Some((*id, AnswerFeedback::new(question, option)))
            })
            .collect()
    }
}

type SessionRef = Arc<Mutex<ActiveSession>>;

/// Runs assessment sessions for every user.
///
/// Lock order is registry first, then session. The registry lock is never
/// held across a store call.
#[derive(Clone)]
pub struct ExamService {
    store: Arc<dyn ExamStore>,
    sessions: Arc<Mutex<HashMap<SessionKey, SessionRef>>>,
}

impl ExamService {
    pub fn new(store: Arc<dyn ExamStore>) -> Self {
        Self {
            store,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resumes the running session, restores a saved draft, or draws a new
    /// question set, in that order of preference.
    pub async fn start(
        &self,
        user_id: i64,
        code: &str,
        options: StartOptions,
    ) -> Result<StartOutcome, ExamError> {
        let spec = lookup_spec(code)?;
        if options.reveal_answers && spec.kind != AssessmentKind::Quiz {
            return Err(ExamError::RevealNotAllowed);
        }
        let key = SessionKey {
            user_id,
            code: spec.code,
        };

        if let Some(session) = self.session(key).await {
            let session = session.lock().await;
            if session.submitted {
                return Err(ExamError::AlreadySubmitted);
            }
            return Ok(StartOutcome::Active(session.view()));
        }

        let now = Utc::now();
        let session = match self.restore(spec, user_id, now).await? {
            Some(session) => session,
            None => self.draw(spec, options, now).await?,
        };

        if session.countdown.is_over() {
            tracing::info!(
                "Draft for user {} on '{}' expired while away; scoring it",
                user_id,
                spec.code
            );
            let session = Arc::new(Mutex::new(session));
            let summary = self.finish_session(key, &session, Finish::TimedOut).await?;
            return Ok(StartOutcome::Finished(summary));
        }

        let session = Arc::new(Mutex::new(session));
        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(&key) {
            // Lost a race with a concurrent start; serve the session that won.
            let existing = existing.clone();
            drop(sessions);
            let existing = existing.lock().await;
            return Ok(StartOutcome::Active(existing.view()));
        }

        let view = {
            let mut guard = session.lock().await;
            guard.timer = Some(self.arm_timer(key, &session));
            guard.view()
        };
        sessions.insert(key, session);
        drop(sessions);

        tracing::info!(
            "User {} started '{}' with {} questions ({}s)",
            user_id,
            spec.code,
            view.total,
            view.time_limit_secs
        );
        Ok(StartOutcome::Active(view))
    }

    pub async fn view(&self, user_id: i64, code: &str) -> Result<SessionView, ExamError> {
        let session = self.active(user_id, code).await?;
        let session = session.lock().await;
        Ok(session.view())
    }

    pub async fn select(
        &self,
        user_id: i64,
        code: &str,
        question_id: i64,
        option: &str,
    ) -> Result<SelectOutcome, ExamError> {
        let session = self.active(user_id, code).await?;
        let mut session = session.lock().await;
        session.ensure_open()?;
        if session.reveal && session.sheet.answers().contains_key(&question_id) {
            return Err(ExamError::AnswerLocked(question_id));
        }

        let selection = session.sheet.select(question_id, option)?;
        let feedback = if session.reveal {
            session
                .sheet
                .question(question_id)
                .map(|question| AnswerFeedback::new(question, option))
        } else {
            None
        };

        Ok(SelectOutcome {
            selection,
            feedback,
            session: session.view(),
        })
    }

    pub async fn navigate(&self, user_id: i64, code: &str, step: Step) -> Result<SessionView, ExamError> {
        let session = self.active(user_id, code).await?;
        let mut session = session.lock().await;
        session.ensure_open()?;
        session.sheet.step(step)?;
        Ok(session.view())
    }

    /// Persists the current progress so it survives the session being lost.
    pub async fn save_draft(&self, user_id: i64, code: &str) -> Result<Draft, ExamError> {
        let session = self.active(user_id, code).await?;
        let draft = {
            let session = session.lock().await;
            session.ensure_open()?;
            Draft {
                user_id,
                assessment_code: session.spec.code.to_string(),
                question_ids: session.sheet.question_ids(),
                answers: session.sheet.answers().clone(),
                current_index: session.sheet.current_index(),
                time_limit_secs: session.time_limit_secs,
                started_at: session.started_at,
                saved_at: Utc::now(),
                reveal_answers: session.reveal,
            }
        };
        self.store.upsert_draft(&draft).await?;
        tracing::debug!("Saved draft for user {} on '{}'", user_id, code);
        Ok(draft)
    }

    pub async fn submit(&self, user_id: i64, code: &str) -> Result<SubmissionSummary, ExamError> {
        let spec = lookup_spec(code)?;
        self.finish(user_id, spec.code, Finish::Manual).await
    }

    /// Quits the session; it is recorded as aborted with the answers so far.
    pub async fn abandon(&self, user_id: i64, code: &str) -> Result<SubmissionSummary, ExamError> {
        let spec = lookup_spec(code)?;
        self.finish(user_id, spec.code, Finish::Aborted).await
    }

    pub async fn finish(
        &self,
        user_id: i64,
        code: &'static str,
        how: Finish,
    ) -> Result<SubmissionSummary, ExamError> {
        let key = SessionKey { user_id, code };
        let session = self.session(key).await.ok_or(ExamError::NoActiveSession)?;
        self.finish_session(key, &session, how).await
    }

    /// Loads a stored result for its owner.
    pub async fn view_result(&self, user_id: i64, result_id: i64) -> Result<ResultView, ExamError> {
        let record = self
            .store
            .find_result(result_id)
            .await?
            .filter(|record| record.result.user_id == user_id)
            .ok_or(ExamError::ResultNotFound)?;

        let title = catalog::find(&record.result.assessment_code)
            .map(|spec| spec.title.to_string())
            .unwrap_or_else(|| record.result.assessment_code.clone());

        Ok(ResultView {
            subjects: scoring::subject_breakdown(&record.items),
            title,
            result: record.result,
            items: record.items,
        })
    }

    /// Drops every live session of a user and stops their timers, without
    /// recording anything. Used when the account is deleted.
    pub async fn evict_user(&self, user_id: i64) -> usize {
        let evicted: Vec<SessionRef> = {
            let mut sessions = self.sessions.lock().await;
            let keys: Vec<SessionKey> = sessions
                .keys()
                .filter(|key| key.user_id == user_id)
                .copied()
                .collect();
            keys.iter().filter_map(|key| sessions.remove(key)).collect()
        };

        for session in &evicted {
            let mut guard = session.lock().await;
            guard.submitted = true;
            guard.timer.take();
        }

        if !evicted.is_empty() {
            tracing::info!("Evicted {} session(s) of user {}", evicted.len(), user_id);
        }
        evicted.len()
    }

    pub async fn is_active(&self, user_id: i64, code: &str) -> bool {
        match catalog::find(code) {
            Some(spec) => self
                .session(SessionKey {
                    user_id,
                    code: spec.code,
                })
                .await
                .is_some(),
            None => false,
        }
    }

    async fn session(&self, key: SessionKey) -> Option<SessionRef> {
        self.sessions.lock().await.get(&key).cloned()
    }

    async fn active(&self, user_id: i64, code: &str) -> Result<SessionRef, ExamError> {
        let spec = lookup_spec(code)?;
        self.session(SessionKey {
            user_id,
            code: spec.code,
        })
        .await
        .ok_or(ExamError::NoActiveSession)
    }

    async fn restore(
        &self,
        spec: &'static AssessmentSpec,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<ActiveSession>, ExamError> {
        let Some(draft) = self.store.find_draft(user_id, spec.code).await? else {
            return Ok(None);
        };

        let questions = self.store.questions_by_ids(&draft.question_ids).await?;
        if questions.is_empty() {
            tracing::warn!(
                "Draft for user {} on '{}' has no surviving questions; starting fresh",
                user_id,
                spec.code
            );
            return Ok(None);
        }

        Ok(Some(ActiveSession {
            spec,
            sheet: AnswerSheet::restore(questions, draft.answers, draft.current_index)?,
            countdown: Countdown::resume(draft.time_limit_secs, draft.started_at, now),
            time_limit_secs: draft.time_limit_secs,
            started_at: draft.started_at,
            restored: true,
            reveal: draft.reveal_answers && spec.kind == AssessmentKind::Quiz,
            submitted: false,
            timer: None,
        }))
    }

    async fn draw(
        &self,
        spec: &'static AssessmentSpec,
        options: StartOptions,
        now: DateTime<Utc>,
    ) -> Result<ActiveSession, ExamError> {
        let query = QuestionQuery {
            assessment_code: spec.code,
            subjects: spec.pick_subjects(options.subjects.as_deref())?,
            per_subject_limit: spec.per_subject_limit,
            order: spec.order,
        };
        let questions = self.store.draw_questions(&query).await?;
        let time_limit_secs = spec.time_limit(questions.len(), options.seconds_per_question)?;

        Ok(ActiveSession {
            spec,
            sheet: AnswerSheet::new(questions)?,
            countdown: Countdown::new(time_limit_secs),
            time_limit_secs,
            started_at: now,
            restored: false,
            reveal: options.reveal_answers,
            submitted: false,
            timer: None,
        })
    }

    // The task only holds a weak reference so a finished session is freed
    // even if an abort is still pending.
    fn arm_timer(&self, key: SessionKey, session: &SessionRef) -> TimerGuard {
        let weak: Weak<Mutex<ActiveSession>> = Arc::downgrade(session);
        let service = self.clone();

        TimerGuard::new(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(session) = weak.upgrade() else {
                    return;
                };
                let tick = session.lock().await.countdown.tick();
                drop(session);

                match tick {
                    Tick::Running(_) => {}
                    Tick::Stopped => return,
                    Tick::Expired => {
                        tracing::info!(
                            "Time is up for user {} on '{}'; submitting",
                            key.user_id,
                            key.code
                        );
                        // Submission drops this task's guard, so it runs on its own task.
                        tokio::spawn(async move {
                            if let Err(e) = service.finish(key.user_id, key.code, Finish::TimedOut).await {
                                tracing::warn!(
                                    "Forced submission for user {} on '{}' failed: {}",
                                    key.user_id,
                                    key.code,
                                    e
                                );
                            }
                        });
                        return;
                    }
                }
            }
        }))
    }

    async fn finish_session(
        &self,
        key: SessionKey,
        session: &SessionRef,
        how: Finish,
    ) -> Result<SubmissionSummary, ExamError> {
        let (spec, new_result, grading, status) = {
            let mut guard = session.lock().await;
            if guard.submitted {
                return Err(ExamError::AlreadySubmitted);
            }

            let status = match how {
                Finish::Manual if guard.countdown.is_over() => ResultStatus::TimedOut,
                Finish::Manual => {
                    if !guard.sheet.is_complete() {
                        return Err(ExamError::Incomplete {
                            answered: guard.sheet.answered_count(),
                            total: guard.sheet.questions().len(),
                        });
                    }
                    ResultStatus::Completed
                }
                Finish::TimedOut => ResultStatus::TimedOut,
                Finish::Aborted => ResultStatus::Aborted,
            };
            guard.submitted = true;

            let spec = guard.spec;
            let questions = guard.sheet.questions();
            let grading = scoring::grade(questions, guard.sheet.answers(), spec.policy);
            let items = questions
                .iter()
                .zip(&grading.items)
                .enumerate()
                .map(|(position, (question, graded))| NewResultItem {
                    position: position as i32,
                    question_id: question.id,
                    user_answer: graded.user_answer.clone(),
                    is_correct: graded.is_correct,
                    question: QuestionSnapshot::from(question),
                })
                .collect();

            let new_result = NewResult {
                user_id: key.user_id,
                assessment_code: spec.code.to_string(),
                score: grading.correct as i32,
                total: grading.total as i32,
                percent: grading.percent as i32,
                grade: grading.grade.to_string(),
                passed: grading.passed,
                status,
                items,
                restored_from: guard.restored.then_some(guard.started_at),
            };
            (spec, new_result, grading, status)
        };

        let result_id = match self.store.record_result(&new_result).await {
            Ok(id) => id,
            Err(e) => {
                session.lock().await.submitted = false;
                return Err(e.into());
            }
        };

        {
            let mut sessions = self.sessions.lock().await;
            if sessions
                .get(&key)
                .is_some_and(|current| Arc::ptr_eq(current, session))
            {
                sessions.remove(&key);
            }
        }
        // Stops the countdown task if it is still running.
        session.lock().await.timer.take();

        tracing::info!(
            "Recorded result {} for user {} on '{}': {}/{} ({})",
            result_id,
            key.user_id,
            spec.code,
            grading.correct,
            grading.total,
            status.as_str()
        );

        Ok(SubmissionSummary {
            result_id,
            assessment_code: spec.code,
            status,
            score: grading.correct,
            total: grading.total,
            percent: grading.percent,
            grade: grading.grade,
            passed: grading.passed,
            subjects: grading.subjects,
        })
    }
}

fn lookup_spec(code: &str) -> Result<&'static AssessmentSpec, ExamError> {
    catalog::find(code).ok_or_else(|| ExamError::UnknownAssessment(code.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{exam::sheet::tests::question, store::MemoryStore};

    fn service_with(count: i64) -> (ExamService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_questions(
            (1..=count).map(|id| question(id, "basic", "1")).collect(),
        ));
        (ExamService::new(store.clone()), store)
    }

    fn active(outcome: StartOutcome) -> SessionView {
        match outcome {
            StartOutcome::Active(view) => view,
            StartOutcome::Finished(_) => panic!("expected an active session"),
        }
    }

    #[tokio::test]
    async fn start_twice_resumes_the_same_session() {
        let (service, _) = service_with(3);
        let first = active(service.start(1, "basic", StartOptions::default()).await.unwrap());
        service.select(1, "basic", 2, "3").await.unwrap();

        let second = active(service.start(1, "basic", StartOptions::default()).await.unwrap());
        assert_eq!(second.started_at, first.started_at);
        assert_eq!(second.answers.get(&2).map(String::as_str), Some("3"));
        assert_eq!(second.time_limit_secs, 60);
    }

    #[tokio::test]
    async fn unknown_code_and_empty_bank_are_reported() {
        let (service, _) = service_with(0);
        assert!(matches!(
            service.start(1, "chemistry", StartOptions::default()).await,
            Err(ExamError::UnknownAssessment(_))
        ));
        assert!(matches!(
            service.start(1, "basic", StartOptions::default()).await,
            Err(ExamError::NoQuestions)
        ));
        assert!(!service.is_active(1, "basic").await);
    }

    #[tokio::test]
    async fn manual_submit_requires_every_answer() {
        let (service, store) = service_with(2);
        service.start(7, "basic", StartOptions::default()).await.unwrap();
        service.select(7, "basic", 1, "1").await.unwrap();

        let err = service.submit(7, "basic").await.unwrap_err();
        assert!(matches!(err, ExamError::Incomplete { answered: 1, total: 2 }));

        service.select(7, "basic", 2, "2").await.unwrap();
        let summary = service.submit(7, "basic").await.unwrap();
        assert_eq!(summary.status, ResultStatus::Completed);
        assert_eq!(summary.score, 1);
        assert_eq!(summary.percent, 50);
        assert!(!summary.passed);

        assert!(matches!(
            service.submit(7, "basic").await,
            Err(ExamError::NoActiveSession)
        ));
        assert_eq!(store.results_for(7).await.len(), 1);
    }

    #[tokio::test]
    async fn failed_write_leaves_session_open() {
        let (service, store) = service_with(1);
        service.start(3, "basic", StartOptions::default()).await.unwrap();
        service.select(3, "basic", 1, "1").await.unwrap();

        store.set_fail_writes(true);
        assert!(matches!(service.submit(3, "basic").await, Err(ExamError::Store(_))));
        assert!(service.is_active(3, "basic").await);

        store.set_fail_writes(false);
        let summary = service.submit(3, "basic").await.unwrap();
        assert_eq!(summary.score, 1);
    }

    #[tokio::test]
    async fn view_result_is_owner_only() {
        let (service, _) = service_with(1);
        service.start(5, "basic", StartOptions::default()).await.unwrap();
        let summary = service.abandon(5, "basic").await.unwrap();
        assert_eq!(summary.status, ResultStatus::Aborted);

        let view = service.view_result(5, summary.result_id).await.unwrap();
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].user_answer, None);
        assert_eq!(view.title, "Basic Anatomy");

        assert!(matches!(
            service.view_result(6, summary.result_id).await,
            Err(ExamError::ResultNotFound)
        ));
    }

    #[tokio::test]
    async fn reveal_shows_correctness_and_locks_the_answer() {
        let (service, store) = service_with(2);
        let options = StartOptions {
            reveal_answers: true,
            ..StartOptions::default()
        };
        let view = active(service.start(8, "basic", options).await.unwrap());
        assert!(view.reveal_answers);
        assert!(view.feedback.is_empty());

        let outcome = service.select(8, "basic", 1, "2").await.unwrap();
        let feedback = outcome.feedback.unwrap();
        assert!(!feedback.is_correct);
        assert_eq!(feedback.correct_answer, "1");
        assert_eq!(outcome.session.feedback.len(), 1);
        assert!(matches!(
            service.select(8, "basic", 1, "1").await,
            Err(ExamError::AnswerLocked(1))
        ));

        service.save_draft(8, "basic").await.unwrap();
        let restarted = ExamService::new(store.clone());
        let restored = active(restarted.start(8, "basic", StartOptions::default()).await.unwrap());
        assert!(restored.reveal_answers);
        assert!(!restored.feedback[&1].is_correct);
        assert_eq!(restored.answers.get(&1).map(String::as_str), Some("2"));
    }

    #[tokio::test]
    async fn answers_stay_hidden_by_default_and_in_exams() {
        let (service, _) = service_with(1);
        service.start(9, "basic", StartOptions::default()).await.unwrap();

        let outcome = service.select(9, "basic", 1, "1").await.unwrap();
        assert!(outcome.feedback.is_none());
        assert!(outcome.session.feedback.is_empty());
        let changed = service.select(9, "basic", 1, "2").await.unwrap();
        assert_eq!(changed.selection, Selection::Replaced);

        let options = StartOptions {
            reveal_answers: true,
            ..StartOptions::default()
        };
        assert!(matches!(
            service.start(9, "lf2", options).await,
            Err(ExamError::RevealNotAllowed)
        ));
    }

    #[tokio::test]
    async fn invalid_timing_is_rejected() {
        let (service, _) = service_with(2);
        let options = StartOptions {
            subjects: None,
            seconds_per_question: Some(45),
            ..StartOptions::default()
        };
        assert!(matches!(
            service.start(1, "basic", options).await,
            Err(ExamError::InvalidTiming(45))
        ));
    }
}
