// src/exam/mod.rs

//! Timed assessment flow.
//!
//! `catalog` defines the assessments, `sheet` holds answers and navigation,
//! `timer` the countdown, `scoring` the pure grading step and `service`
//! ties them to an [`crate::store::ExamStore`].

pub mod catalog;
pub mod scoring;
pub mod service;
pub mod sheet;
pub mod timer;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::error::AppError;

/// Question id to selected option key.
pub type AnswerMap = BTreeMap<i64, String>;

#[derive(Debug, Error)]
pub enum ExamError {
    #[error("Unknown assessment '{0}'")]
    UnknownAssessment(String),
    #[error("Unknown subject '{0}'")]
    UnknownSubject(String),
    /// Requested seconds per question is not one of the allowed values.
    #[error("{0} seconds per question is not an allowed time limit")]
    InvalidTiming(u32),
    #[error("Answers can only be revealed during a quiz")]
    RevealNotAllowed,
    #[error("No questions are available for this assessment")]
    NoQuestions,
    #[error("No assessment session in progress")]
    NoActiveSession,
    #[error("Question {0} is not part of this session")]
    UnknownQuestion(i64),
    #[error("Question {question_id} has no option '{option}'")]
    UnknownOption { question_id: i64, option: String },
    /// Answers are final once their correctness has been shown.
    #[error("Question {0} has already been answered")]
    AnswerLocked(i64),
    #[error("Question index {index} is out of range (0..{len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Answer every question before submitting ({answered}/{total})")]
    Incomplete { answered: usize, total: usize },
    /// The session has been submitted or its time has run out.
    #[error("This session no longer accepts answers")]
    SessionClosed,
    #[error("This session has already been submitted")]
    AlreadySubmitted,
    #[error("Result not found")]
    ResultNotFound,
    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<ExamError> for AppError {
    fn from(err: ExamError) -> Self {
        match err {
            ExamError::Store(inner) => inner,
            ExamError::UnknownAssessment(_)
            | ExamError::NoQuestions
            | ExamError::NoActiveSession
            | ExamError::ResultNotFound => AppError::NotFound(err.to_string()),
            ExamError::AlreadySubmitted | ExamError::SessionClosed | ExamError::AnswerLocked(_) => {
                AppError::Conflict(err.to_string())
            }
            ExamError::UnknownSubject(_)
            | ExamError::InvalidTiming(_)
            | ExamError::RevealNotAllowed
            | ExamError::UnknownQuestion(_)
            | ExamError::UnknownOption { .. }
            | ExamError::IndexOutOfRange { .. }
            | ExamError::Incomplete { .. } => AppError::BadRequest(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_and_status_mapping() {
        let err = ExamError::Incomplete { answered: 1, total: 2 };
        assert_eq!(err.to_string(), "Answer every question before submitting (1/2)");
        assert!(matches!(AppError::from(err), AppError::BadRequest(_)));

        assert!(matches!(AppError::from(ExamError::AnswerLocked(3)), AppError::Conflict(_)));
        assert!(matches!(AppError::from(ExamError::NoActiveSession), AppError::NotFound(_)));

        let wrapped = ExamError::from(AppError::Conflict("taken".to_string()));
        assert!(matches!(AppError::from(wrapped), AppError::Conflict(msg) if msg == "taken"));
    }
}
