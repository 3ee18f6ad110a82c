// src/exam/sheet.rs

//! Answers and navigation for one loaded question set.

use serde::{Deserialize, Serialize};

use crate::{
    exam::{AnswerMap, ExamError},
    models::question::Question,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// The same option was already selected.
    Unchanged,
    Recorded,
    /// A different option was selected before and has been overwritten.
    Replaced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "move", content = "index", rename_all = "snake_case")]
pub enum Step {
    Next,
    Prev,
    #[serde(rename = "goto")]
    To(usize),
}

/// Holds the loaded questions, the answers given so far and the current index.
///
/// Answer keys are always a subset of the loaded question ids and the index
/// always points at a loaded question.
#[derive(Debug, Clone)]
pub struct AnswerSheet {
    questions: Vec<Question>,
    answers: AnswerMap,
    index: usize,
}

impl AnswerSheet {
    pub fn new(questions: Vec<Question>) -> Result<Self, ExamError> {
        if questions.is_empty() {
            return Err(ExamError::NoQuestions);
        }
        Ok(Self {
            questions,
            answers: AnswerMap::new(),
            index: 0,
        })
    }

    /// Rebuilds a sheet from saved progress. Answers for questions that are
    /// no longer loaded, or whose option no longer exists, are dropped.
    pub fn restore(questions: Vec<Question>, answers: AnswerMap, index: usize) -> Result<Self, ExamError> {
        let mut sheet = Self::new(questions)?;
        sheet.answers = answers
            .into_iter()
            .filter(|(id, key)| {
                sheet
                    .questions
                    .iter()
                    .any(|q| q.id == *id && q.has_option(key))
            })
            .collect();
        sheet.index = index.min(sheet.questions.len() - 1);
        Ok(sheet)
    }

    pub fn select(&mut self, question_id: i64, option: &str) -> Result<Selection, ExamError> {
        let question = self
            .question(question_id)
            .ok_or(ExamError::UnknownQuestion(question_id))?;

        if !question.has_option(option) {
            return Err(ExamError::UnknownOption {
                question_id,
                option: option.to_string(),
            });
        }

        match self.answers.insert(question_id, option.to_string()) {
            None => Ok(Selection::Recorded),
            Some(previous) if previous == option => Ok(Selection::Unchanged),
            Some(_) => Ok(Selection::Replaced),
        }
    }

    /// Moves one question forward; stays put on the last question.
    pub fn next(&mut self) -> usize {
        if self.index + 1 < self.questions.len() {
            self.index += 1;
        }
        self.index
    }

    /// Moves one question back; stays put on the first question.
    pub fn prev(&mut self) -> usize {
        self.index = self.index.saturating_sub(1);
        self.index
    }

    pub fn go_to(&mut self, index: usize) -> Result<usize, ExamError> {
        if index >= self.questions.len() {
            return Err(ExamError::IndexOutOfRange {
                index,
                len: self.questions.len(),
            });
        }
        self.index = index;
        Ok(self.index)
    }

    pub fn step(&mut self, step: Step) -> Result<usize, ExamError> {
        match step {
            Step::Next => Ok(self.next()),
            Step::Prev => Ok(self.prev()),
            Step::To(index) => self.go_to(index),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.answers.len() == self.questions.len()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn question(&self, id: i64) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn question_ids(&self) -> Vec<i64> {
        self.questions.iter().map(|q| q.id).collect()
    }
}
