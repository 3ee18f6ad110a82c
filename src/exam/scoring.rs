// src/exam/scoring.rs

//! Pure grading of an answer set against its loaded questions.

use serde::Serialize;

use crate::{
    exam::AnswerMap,
    models::{question::Question, result::ResultItem},
};

/// Pass rule for an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassPolicy {
    pub min_percent: u32,
    /// Exams additionally require this many correct answers in every subject.
    pub min_correct_per_subject: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectScore {
    pub subject_code: String,
    pub correct: u32,
    pub total: u32,
    /// Percent of the subject answered correctly.
    pub rate: u32,
}

#[derive(Debug, Clone)]
pub struct GradedItem {
    pub question_id: i64,
    pub user_answer: Option<String>,
    pub is_correct: bool,
}

#[derive(Debug, Clone)]
pub struct Grading {
    pub correct: u32,
    pub total: u32,
    pub percent: u32,
    pub grade: &'static str,
    pub passed: bool,
    pub subjects: Vec<SubjectScore>,
    /// One entry per loaded question, in session order.
    pub items: Vec<GradedItem>,
}

/// Rounded percentage; zero when there is nothing to score.
pub fn percent(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (f64::from(correct) * 100.0 / f64::from(total)).round() as u32
}

pub fn grade_letter(percent: u32) -> &'static str {
    match percent {
        90.. => "S",
        80..=89 => "A",
        70..=79 => "B",
        60..=69 => "C",
        _ => "D",
    }
}

pub fn grade(questions: &[Question], answers: &AnswerMap, policy: PassPolicy) -> Grading {
    let items: Vec<GradedItem> = questions
        .iter()
        .map(|q| {
            let user_answer = answers.get(&q.id).cloned();
            let is_correct = user_answer.as_deref() == Some(q.correct_answer.as_str());
            GradedItem {
                question_id: q.id,
                user_answer,
                is_correct,
            }
        })
        .collect();

    let subjects = tally(
        questions
            .iter()
            .zip(&items)
            .map(|(q, item)| (q.subject_code.as_str(), item.is_correct)),
    );

    let total = items.len() as u32;
    let correct = items.iter().filter(|item| item.is_correct).count() as u32;
    let percent = percent(correct, total);

    let subjects_ok = match policy.min_correct_per_subject {
        Some(min) => subjects.iter().all(|s| s.correct >= min),
        None => true,
    };

    Grading {
        correct,
        total,
        percent,
        grade: grade_letter(percent),
        passed: total > 0 && percent >= policy.min_percent && subjects_ok,
        subjects,
        items,
    }
}

/// Per-subject breakdown of stored result items.
pub fn subject_breakdown(items: &[ResultItem]) -> Vec<SubjectScore> {
    tally(
        items
            .iter()
            .map(|item| (item.question.0.subject_code.as_str(), item.is_correct)),
    )
}

// Keeps subjects in first-seen order.
fn tally<'a>(marks: impl Iterator<Item = (&'a str, bool)>) -> Vec<SubjectScore> {
    let mut subjects: Vec<SubjectScore> = Vec::new();
    for (subject, is_correct) in marks {
        let pos = match subjects.iter().position(|s| s.subject_code == subject) {
            Some(pos) => pos,
            None => {
                subjects.push(SubjectScore {
                    subject_code: subject.to_string(),
                    correct: 0,
                    total: 0,
                    rate: 0,
                });
                subjects.len() - 1
            }
        };
        let entry = &mut subjects[pos];
        entry.total += 1;
        if is_correct {
            entry.correct += 1;
        }
    }
    for entry in &mut subjects {
        entry.rate = percent(entry.correct, entry.total);
    }
    subjects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exam::sheet::tests::question;

    const QUIZ: PassPolicy = PassPolicy {
        min_percent: 60,
        min_correct_per_subject: None,
    };

    fn answers(pairs: &[(i64, &str)]) -> AnswerMap {
        pairs.iter().map(|(id, key)| (*id, key.to_string())).collect()
    }

    #[test]
    fn test_percent_rounds() {
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(5, 5), 100);
    }

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(grade_letter(100), "S");
        assert_eq!(grade_letter(90), "S");
        assert_eq!(grade_letter(89), "A");
        assert_eq!(grade_letter(80), "A");
        assert_eq!(grade_letter(70), "B");
        assert_eq!(grade_letter(60), "C");
        assert_eq!(grade_letter(59), "D");
        assert_eq!(grade_letter(0), "D");
    }

    #[test]
    fn test_grade_perfect() {
        let questions = vec![question(1, "basic", "1"), question(2, "basic", "2")];
        let result = grade(&questions, &answers(&[(1, "1"), (2, "2")]), QUIZ);
        assert_eq!(result.correct, 2);
        assert_eq!(result.percent, 100);
        assert_eq!(result.grade, "S");
        assert!(result.passed);
    }

    #[test]
    fn test_unanswered_counts_as_wrong() {
        let questions: Vec<_> = (1..=5).map(|id| question(id, "basic", "1")).collect();
        let result = grade(&questions, &answers(&[(1, "1"), (2, "1"), (3, "1")]), QUIZ);
        assert_eq!(result.total, 5);
        assert_eq!(result.correct, 3);
        assert_eq!(result.percent, 60);
        assert!(result.passed);
        assert_eq!(result.items.len(), 5);
        assert_eq!(result.items[4].user_answer, None);
        assert!(!result.items[4].is_correct);
    }

    #[test]
    fn test_subject_floor_fails_exam() {
        let policy = PassPolicy {
            min_percent: 60,
            min_correct_per_subject: Some(2),
        };
        // 4 of 5 overall, but only 1 of 2 in the second subject.
        let questions = vec![
            question(1, "biomechanics", "1"),
            question(2, "biomechanics", "1"),
            question(3, "biomechanics", "1"),
            question(4, "sports_psychology", "1"),
            question(5, "sports_psychology", "1"),
        ];
        let result = grade(
            &questions,
            &answers(&[(1, "1"), (2, "1"), (3, "1"), (4, "1"), (5, "2")]),
            policy,
        );
        assert_eq!(result.percent, 80);
        assert!(!result.passed);
        assert_eq!(result.subjects.len(), 2);
        assert_eq!(result.subjects[0].subject_code, "biomechanics");
        assert_eq!(result.subjects[0].rate, 100);
        assert_eq!(result.subjects[1].correct, 1);
        assert_eq!(result.subjects[1].rate, 50);
    }

    #[test]
    fn test_nothing_to_grade_never_passes() {
        let result = grade(&[], &AnswerMap::new(), QUIZ);
        assert_eq!(result.percent, 0);
        assert!(!result.passed);
    }
}
