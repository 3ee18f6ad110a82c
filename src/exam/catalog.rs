// src/exam/catalog.rs

//! Static assessment definitions.

use serde::Serialize;

use crate::exam::{ExamError, scoring::PassPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentKind {
    /// Short topic quiz, timed per question.
    Quiz,
    /// Mock certification exam with one overall time limit.
    Exam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionOrder {
    Authored,
    Random,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Timing {
    PerQuestion {
        default_secs: u32,
        allowed_secs: &'static [u32],
    },
    Total {
        secs: u32,
    },
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Subject {
    pub code: &'static str,
    pub name: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AssessmentSpec {
    pub code: &'static str,
    pub title: &'static str,
    pub kind: AssessmentKind,
    pub subjects: &'static [Subject],
    /// Questions drawn per subject; `None` takes every question.
    pub per_subject_limit: Option<u32>,
    pub order: QuestionOrder,
    pub timing: Timing,
    pub policy: PassPolicy,
}

const QUIZ_TIMING: Timing = Timing::PerQuestion {
    default_secs: 20,
    allowed_secs: &[10, 20, 30, 60],
};

const QUIZ_POLICY: PassPolicy = PassPolicy {
    min_percent: 60,
    min_correct_per_subject: None,
};

pub static CATALOG: [AssessmentSpec; 4] = [
    AssessmentSpec {
        code: "basic",
        title: "Basic Anatomy",
        kind: AssessmentKind::Quiz,
        subjects: &[Subject {
            code: "basic",
            name: "Basic Anatomy",
        }],
        per_subject_limit: None,
        order: QuestionOrder::Authored,
        timing: QUIZ_TIMING,
        policy: QUIZ_POLICY,
    },
    AssessmentSpec {
        code: "functional",
        title: "Functional Anatomy",
        kind: AssessmentKind::Quiz,
        subjects: &[Subject {
            code: "functional",
            name: "Functional Anatomy",
        }],
        per_subject_limit: None,
        order: QuestionOrder::Authored,
        timing: QUIZ_TIMING,
        policy: QUIZ_POLICY,
    },
    AssessmentSpec {
        code: "neuro",
        title: "Neuroanatomy",
        kind: AssessmentKind::Quiz,
        subjects: &[Subject {
            code: "neuro",
            name: "Neuroanatomy",
        }],
        per_subject_limit: None,
        order: QuestionOrder::Authored,
        timing: QUIZ_TIMING,
        policy: QUIZ_POLICY,
    },
    AssessmentSpec {
        code: "lf2",
        title: "Sports Instructor Level 2 Mock Exam",
        kind: AssessmentKind::Exam,
        subjects: &[
            Subject {
                code: "exercise_physiology",
                name: "Exercise Physiology",
            },
            Subject {
                code: "biomechanics",
                name: "Biomechanics",
            },
            Subject {
                code: "sports_sociology",
                name: "Sports Sociology",
            },
            Subject {
                code: "sports_psychology",
                name: "Sports Psychology",
            },
            Subject {
                code: "korean_sports_history",
                name: "Korean Sports History",
            },
        ],
        per_subject_limit: Some(20),
        order: QuestionOrder::Random,
        timing: Timing::Total { secs: 100 * 60 },
        policy: PassPolicy {
            min_percent: 60,
            min_correct_per_subject: Some(8),
        },
    },
];

pub fn find(code: &str) -> Option<&'static AssessmentSpec> {
    CATALOG.iter().find(|spec| spec.code == code)
}

impl AssessmentSpec {
    /// Session time limit in seconds for `question_count` questions.
    pub fn time_limit(
        &self,
        question_count: usize,
        seconds_per_question: Option<u32>,
    ) -> Result<u32, ExamError> {
        match self.timing {
            Timing::Total { secs } => Ok(secs),
            Timing::PerQuestion {
                default_secs,
                allowed_secs,
            } => {
                let per_question = seconds_per_question.unwrap_or(default_secs);
                if !allowed_secs.contains(&per_question) {
                    return Err(ExamError::InvalidTiming(per_question));
                }
                Ok(per_question.saturating_mul(question_count as u32))
            }
        }
    }

    /// Resolves the subjects to draw from. `None` or an empty list means all.
    pub fn pick_subjects(&self, requested: Option<&[String]>) -> Result<Vec<&'static str>, ExamError> {
        let requested = match requested {
            Some(codes) if !codes.is_empty() => codes,
            _ => return Ok(self.subjects.iter().map(|s| s.code).collect()),
        };

        // Catalog order wins so the paper reads subject by subject.
        for code in requested {
            if !self.subjects.iter().any(|s| s.code == code) {
                return Err(ExamError::UnknownSubject(code.clone()));
            }
        }
        Ok(self
            .subjects
            .iter()
            .filter(|s| requested.iter().any(|r| r == s.code))
            .map(|s| s.code)
            .collect())
    }

    pub fn subject_name(&self, code: &str) -> Option<&'static str> {
        self.subjects.iter().find(|s| s.code == code).map(|s| s.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        for (i, spec) in CATALOG.iter().enumerate() {
            assert!(CATALOG[i + 1..].iter().all(|other| other.code != spec.code));
        }
    }

    #[test]
    fn quiz_limit_scales_with_question_count() {
        let basic = find("basic").unwrap();
        assert_eq!(basic.time_limit(10, None).unwrap(), 200);
        assert_eq!(basic.time_limit(10, Some(60)).unwrap(), 600);
        assert!(matches!(
            basic.time_limit(10, Some(15)),
            Err(ExamError::InvalidTiming(15))
        ));
    }

    #[test]
    fn exam_limit_is_fixed() {
        let lf2 = find("lf2").unwrap();
        assert_eq!(lf2.time_limit(100, Some(15)).unwrap(), 6000);
    }

    #[test]
    fn subject_selection_keeps_catalog_order() {
        let lf2 = find("lf2").unwrap();
        let picked = lf2
            .pick_subjects(Some(&["biomechanics".to_string(), "exercise_physiology".to_string()]))
            .unwrap();
        assert_eq!(picked, vec!["exercise_physiology", "biomechanics"]);
        assert_eq!(lf2.pick_subjects(None).unwrap().len(), 5);
    }

    #[test]
    fn unknown_subject_is_rejected() {
        let lf2 = find("lf2").unwrap();
        let err = lf2.pick_subjects(Some(&["chemistry".to_string()])).unwrap_err();
        assert!(matches!(err, ExamError::UnknownSubject(code) if code == "chemistry"));
    }
}
