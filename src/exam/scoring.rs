// src/exam/scoring.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::question::{AnswerValue, Question};

/// Selected answers keyed by question id.
pub type AnswerMap = BTreeMap<i64, AnswerValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub correct: usize,
    pub total: usize,
    /// Whole-number percentage, halves rounded up.
    pub percentage: u32,
}

/// Grades `answers` against the loaded question list.
///
/// Every question in `questions` counts towards the total; a question with no
/// stored answer is incorrect, and answers for ids outside the list are ignored.
/// Comparison is strict: an option index never matches a boolean key.
pub fn score(answers: &AnswerMap, questions: &[Question]) -> ScoreSummary {
    let total = questions.len();
    let correct = questions
        .iter()
        .filter(|q| answers.get(&q.id) == Some(&q.correct_answer))
        .count();

    ScoreSummary {
        correct,
        total,
        percentage: percentage(correct, total),
    }
}

/// `round(correct / total * 100)`, or 0 for an empty exam.
pub fn percentage(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    // Integer form of round-half-up to avoid float drift on exact halves.
    ((correct * 200 + total) / (total * 2)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::QuestionKind;

    fn mcq(id: i64, key: u32) -> Question {
        Question {
            id,
            text: format!("Question {}", id),
            kind: QuestionKind::MultipleChoice,
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_answer: AnswerValue::Choice(key),
            category: None,
            image_url: None,
            created_at: None,
        }
    }

    fn truefalse(id: i64, key: bool) -> Question {
        Question {
            id,
            text: format!("Statement {}", id),
            kind: QuestionKind::TrueFalse,
            options: Vec::new(),
            correct_answer: AnswerValue::Flag(key),
            category: None,
            image_url: None,
            created_at: None,
        }
    }

    #[test]
    fn test_score_perfect() {
        let questions = vec![mcq(1, 0), truefalse(2, true)];
        let mut answers = AnswerMap::new();
        answers.insert(1, AnswerValue::Choice(0));
        answers.insert(2, AnswerValue::Flag(true));

        let summary = score(&answers, &questions);
        assert_eq!(summary.correct, 2);
        assert_eq!(summary.percentage, 100);
    }

    #[test]
    fn test_score_three_of_five_with_blanks() {
        let questions: Vec<Question> = (1..=5).map(|i| mcq(i, 1)).collect();
        let mut answers = AnswerMap::new();
        answers.insert(1, AnswerValue::Choice(1));
        answers.insert(2, AnswerValue::Choice(1));
        answers.insert(3, AnswerValue::Choice(1));

        let summary = score(&answers, &questions);
        assert_eq!(
            summary,
            ScoreSummary {
                correct: 3,
                total: 5,
                percentage: 60
            }
        );
    }

    #[test]
    fn test_score_is_strict_about_answer_shape() {
        let questions = vec![truefalse(1, true), mcq(2, 1)];
        let mut answers = AnswerMap::new();
        answers.insert(1, AnswerValue::Choice(1));
        answers.insert(2, AnswerValue::Flag(true));

        assert_eq!(score(&answers, &questions).correct, 0);
    }

    #[test]
    fn test_score_ignores_foreign_answers() {
        let questions = vec![mcq(1, 2)];
        let mut answers = AnswerMap::new();
        answers.insert(99, AnswerValue::Choice(2));

        let summary = score(&answers, &questions);
        assert_eq!(summary.correct, 0);
        assert_eq!(summary.total, 1);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13); // 12.5 rounds up
        assert_eq!(percentage(0, 0), 0);
    }

    #[test]
    fn test_percentage_bounds_and_monotonicity() {
        for total in 1..=40usize {
            let mut last = 0;
            for correct in 0..=total {
                let p = percentage(correct, total);
                assert!(p <= 100);
                assert!(p >= last, "{}/{}", correct, total);
                last = p;
            }
            assert_eq!(percentage(total, total), 100);
        }
    }
}
