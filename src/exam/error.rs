// src/exam/error.rs

use std::fmt;

/// Errors raised by the exam core. None of them are transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExamError {
    /// No questions exist for the candidate's category; the exam cannot start.
    NoQuestions { category: String },
    /// The session has been submitted; answers are frozen.
    Locked,
    /// A submission is in progress or already done.
    AlreadySubmitted,
    /// The session was created but not started.
    NotStarted,
    UnknownQuestion(i64),
    InvalidAnswer { question_id: i64, reason: String },
    /// The candidate may only submit from the last question.
    NotOnLastQuestion,
    /// A result already exists for this exam code.
    CodeAlreadyUsed(String),
    /// No live session exists for this exam code.
    SessionNotFound(String),
}

impl fmt::Display for ExamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamError::NoQuestions { category } => {
                write!(f, "No questions available for category '{}'", category)
            }
            ExamError::Locked => write!(f, "The exam has been submitted and is locked"),
            ExamError::AlreadySubmitted => write!(f, "The exam has already been submitted"),
            ExamError::NotStarted => write!(f, "The exam has not started"),
            ExamError::UnknownQuestion(id) => write!(f, "Question {} is not part of this exam", id),
            ExamError::InvalidAnswer { question_id, reason } => {
                write!(f, "Invalid answer for question {}: {}", question_id, reason)
            }
            ExamError::NotOnLastQuestion => {
                write!(f, "The exam can only be submitted from the last question")
            }
            ExamError::CodeAlreadyUsed(code) => {
                write!(f, "Exam code '{}' has already been used", code)
            }
            ExamError::SessionNotFound(code) => {
                write!(f, "No exam in progress for code '{}'", code)
            }
        }
    }
}

impl std::error::Error for ExamError {}
