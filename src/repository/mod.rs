// src/repository/mod.rs

//! Storage ports. The exam core and the HTTP handlers only see these traits;
//! `PgRepository` backs them in production and `MemoryRepository` in tests.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        alert::{AlertListParams, AlertStatus, IntegrityAlert},
        candidate::{Candidate, CandidateListParams},
        exam_record::{AppendOutcome, ExamResult, ResultListParams},
        question::{Question, QuestionListParams},
    },
};

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

/// Supplies the ordered question list for a candidate's category.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Questions tagged with `category` plus uncategorised ones, ordered by id.
    async fn for_category(&self, category: &str) -> Result<Vec<Question>, AppError>;
}

/// Receives finished exam results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Records `result` and marks its exam code as used, atomically.
    /// A second result for the same code is not written.
    async fn append(&self, result: &ExamResult) -> Result<AppendOutcome, AppError>;

    async fn has_result(&self, exam_code: &str) -> Result<bool, AppError>;

    /// The record stored for `exam_code`, if any.
    async fn stored_result(&self, exam_code: &str) -> Result<Option<ExamResult>, AppError>;
}

#[async_trait]
pub trait CandidateRepository: Send + Sync {
    async fn list_candidates(&self, params: &CandidateListParams) -> Result<Vec<Candidate>, AppError>;

    async fn find_candidate(&self, code: &str) -> Result<Option<Candidate>, AppError>;

    /// Fails with `Conflict` when the code exists.
    async fn insert_candidate(&self, candidate: &Candidate) -> Result<(), AppError>;

    /// Fails with `NotFound` when the code does not exist.
    async fn update_candidate(&self, candidate: &Candidate) -> Result<(), AppError>;

    async fn delete_candidates(&self, codes: &[String]) -> Result<u64, AppError>;

    /// Drops every candidate and stores `candidates` instead.
    async fn replace_candidates(&self, candidates: &[Candidate]) -> Result<(), AppError>;

    async fn set_code_used(&self, code: &str, used: bool) -> Result<(), AppError>;

    async fn count_candidates(&self) -> Result<i64, AppError>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    async fn list_questions(&self, params: &QuestionListParams) -> Result<Vec<Question>, AppError>;

    async fn find_question(&self, id: i64) -> Result<Option<Question>, AppError>;

    /// Stores a new question and returns it with its assigned id.
    async fn insert_question(&self, question: &Question) -> Result<Question, AppError>;

    async fn update_question(&self, question: &Question) -> Result<(), AppError>;

    async fn delete_question(&self, id: i64) -> Result<bool, AppError>;

    async fn count_questions(&self) -> Result<i64, AppError>;
}

#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn list_results(&self, params: &ResultListParams) -> Result<Vec<ExamResult>, AppError>;

    async fn find_result(&self, id: Uuid) -> Result<Option<ExamResult>, AppError>;

    /// Removes the record and returns it.
    async fn delete_result(&self, id: Uuid) -> Result<Option<ExamResult>, AppError>;

    /// Removes every record and frees every exam code.
    async fn delete_all_results(&self) -> Result<u64, AppError>;

    /// Returns (total, flagged, average score).
    async fn result_stats(&self) -> Result<(i64, i64, Option<f64>), AppError>;
}

#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn append_alert(&self, alert: &IntegrityAlert) -> Result<(), AppError>;

    async fn list_alerts(&self, params: &AlertListParams) -> Result<Vec<IntegrityAlert>, AppError>;

    /// Sets `status` on every listed alert. Returns how many were found.
    async fn set_alert_status(&self, ids: &[Uuid], status: AlertStatus) -> Result<u64, AppError>;

    async fn delete_alerts(&self, ids: &[Uuid]) -> Result<u64, AppError>;

    /// Returns (total, active).
    async fn alert_counts(&self) -> Result<(i64, i64), AppError>;
}

/// The set of storage handles injected into the application state.
#[derive(Clone)]
pub struct Repositories {
    pub candidates: Arc<dyn CandidateRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub question_source: Arc<dyn QuestionSource>,
    pub results: Arc<dyn ResultRepository>,
    pub result_store: Arc<dyn ResultStore>,
    pub alerts: Arc<dyn AlertRepository>,
}

impl Repositories {
    /// Wires every port to a single backend.
    pub fn from_backend<R>(backend: Arc<R>) -> Self
    where
        R: CandidateRepository
            + QuestionRepository
            + QuestionSource
            + ResultRepository
            + ResultStore
            + AlertRepository
            + 'static,
    {
        Self {
            candidates: backend.clone(),
            questions: backend.clone(),
            question_source: backend.clone(),
            results: backend.clone(),
            result_store: backend.clone(),
            alerts: backend,
        }
    }
}
