// src/models/question.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::models::validate_url_string;

/// Represents the 'questions' table in the database.
/// Authored once and read-only to the assessment flow.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// Catalog code this question belongs to (e.g. 'basic', 'lf2').
    pub assessment_code: String,

    pub subject_code: String,

    /// 'text' or 'image'. Image questions carry `image_url` instead of a prompt.
    pub question_type: String,

    pub prompt: Option<String>,

    /// Optional reading passage shown above the prompt.
    pub passage: Option<String>,

    pub image_url: Option<String>,

    /// 'text' or 'image': whether option values are labels or image URLs.
    pub option_type: String,

    /// Option key (e.g. "1", "A") to label or image URL.
    pub options: Json<BTreeMap<String, String>>,

    /// Key of the correct option.
    pub correct_answer: String,

    pub explanation: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Question {
    pub fn has_option(&self, key: &str) -> bool {
        self.options.0.contains_key(key)
    }
}

/// DTO for sending a question to a running session (no answer, no explanation).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub subject_code: String,
    pub question_type: String,
    pub prompt: Option<String>,
    pub passage: Option<String>,
    pub image_url: Option<String>,
    pub option_type: String,
    pub options: BTreeMap<String, String>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            subject_code: q.subject_code.clone(),
            question_type: q.question_type.clone(),
            prompt: q.prompt.clone(),
            passage: q.passage.clone(),
            image_url: q.image_url.clone(),
            option_type: q.option_type.clone(),
            options: q.options.0.clone(),
        }
    }
}

/// Copy of the question stored with each result item, so a review still
/// renders after the question itself is removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSnapshot {
    pub subject_code: String,
    pub question_type: String,
    pub prompt: Option<String>,
    pub passage: Option<String>,
    pub image_url: Option<String>,
    pub option_type: String,
    pub options: BTreeMap<String, String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

impl From<&Question> for QuestionSnapshot {
    fn from(q: &Question) -> Self {
        Self {
            subject_code: q.subject_code.clone(),
            question_type: q.question_type.clone(),
            prompt: q.prompt.clone(),
            passage: q.passage.clone(),
            image_url: q.image_url.clone(),
            option_type: q.option_type.clone(),
            options: q.options.0.clone(),
            correct_answer: q.correct_answer.clone(),
            explanation: q.explanation.clone(),
        }
    }
}

/// DTO for authoring a new question (admin).
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_question_shape))]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 50))]
    pub assessment_code: String,
    #[validate(length(min = 1, max = 50))]
    pub subject_code: String,
    #[serde(default = "text_kind")]
    pub question_type: String,
    #[validate(length(max = 2000))]
    pub prompt: Option<String>,
    #[validate(length(max = 5000))]
    pub passage: Option<String>,
    #[validate(custom(function = validate_url_string))]
    pub image_url: Option<String>,
    #[serde(default = "text_kind")]
    pub option_type: String,
    #[validate(custom(function = validate_options))]
    pub options: BTreeMap<String, String>,
    #[validate(length(min = 1, max = 10))]
    pub correct_answer: String,
    #[validate(length(max = 5000))]
    pub explanation: Option<String>,
}

fn text_kind() -> String {
    "text".to_string()
}

fn validate_options(options: &BTreeMap<String, String>) -> Result<(), validator::ValidationError> {
    if options.len() < 2 {
        return Err(validator::ValidationError::new("at_least_two_options"));
    }
    for (key, value) in options {
        if key.is_empty() || key.len() > 10 {
            return Err(validator::ValidationError::new("invalid_option_key"));
        }
        if value.is_empty() || value.len() > 500 {
            return Err(validator::ValidationError::new("invalid_option_value"));
        }
    }
    Ok(())
}

fn validate_question_shape(req: &CreateQuestionRequest) -> Result<(), validator::ValidationError> {
    if !matches!(req.question_type.as_str(), "text" | "image") {
        return Err(validator::ValidationError::new("invalid_question_type"));
    }
    if !matches!(req.option_type.as_str(), "text" | "image") {
        return Err(validator::ValidationError::new("invalid_option_type"));
    }
    match req.question_type.as_str() {
        "image" if req.image_url.is_none() => {
            return Err(validator::ValidationError::new("image_question_needs_image_url"));
        }
        "text" if req.prompt.as_deref().is_none_or(str::is_empty) => {
            return Err(validator::ValidationError::new("text_question_needs_prompt"));
        }
        _ => {}
    }
    if !req.options.contains_key(&req.correct_answer) {
        return Err(validator::ValidationError::new("correct_answer_not_an_option"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateQuestionRequest {
        CreateQuestionRequest {
            assessment_code: "basic".to_string(),
            subject_code: "basic".to_string(),
            question_type: "text".to_string(),
            prompt: Some("Which muscle flexes the elbow?".to_string()),
            passage: None,
            image_url: None,
            option_type: "text".to_string(),
            options: BTreeMap::from([
                ("1".to_string(), "Biceps brachii".to_string()),
                ("2".to_string(), "Triceps brachii".to_string()),
            ]),
            correct_answer: "1".to_string(),
            explanation: None,
        }
    }

    #[test]
    fn accepts_well_formed_question() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn rejects_correct_answer_outside_options() {
        let mut req = request();
        req.correct_answer = "3".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn image_question_requires_url() {
        let mut req = request();
        req.question_type = "image".to_string();
        assert!(req.validate().is_err());

        req.image_url = Some("https://cdn.example.com/q1.png".to_string());
        assert!(req.validate().is_ok());
    }
}
