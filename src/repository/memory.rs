// src/repository/memory.rs

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        alert::{AlertListParams, AlertStatus, IntegrityAlert},
        candidate::{Candidate, CandidateListParams},
        exam_record::{AppendOutcome, ExamResult, ResultListParams, ResultStatus},
        question::{Question, QuestionListParams},
    },
    repository::{
        AlertRepository, CandidateRepository, QuestionRepository, QuestionSource, ResultRepository,
        ResultStore,
    },
};

#[derive(Default)]
struct Tables {
    candidates: BTreeMap<String, Candidate>,
    questions: BTreeMap<i64, Question>,
    last_question_id: i64,
    results: Vec<ExamResult>,
    alerts: Vec<IntegrityAlert>,
}

/// Process-local storage. Used by tests and for running without a database.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn question_matches(params: &QuestionListParams, question: &Question) -> bool {
    let category_ok = match params.category.as_deref() {
        None | Some("") | Some("all") => true,
        Some(c) => question.category.as_deref() == Some(c),
    };
    let search_ok = match params.search.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(term) => question.text.to_lowercase().contains(&term.to_lowercase()),
    };
    category_ok && search_ok
}

#[async_trait]
impl QuestionSource for MemoryRepository {
    async fn for_category(&self, category: &str) -> Result<Vec<Question>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .questions
            .values()
            .filter(|q| q.applies_to(category))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ResultStore for MemoryRepository {
    async fn append(&self, result: &ExamResult) -> Result<AppendOutcome, AppError> {
        let mut tables = self.tables.write().await;
        if tables.results.iter().any(|r| r.exam_code == result.exam_code) {
            return Ok(AppendOutcome::Duplicate);
        }
        tables.results.push(result.clone());
        if let Some(candidate) = tables.candidates.get_mut(&result.exam_code) {
            candidate.code_used = true;
        }
        Ok(AppendOutcome::Appended)
    }

    async fn has_result(&self, exam_code: &str) -> Result<bool, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.results.iter().any(|r| r.exam_code == exam_code))
    }

    async fn stored_result(&self, exam_code: &str) -> Result<Option<ExamResult>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.results.iter().find(|r| r.exam_code == exam_code).cloned())
    }
}

#[async_trait]
impl CandidateRepository for MemoryRepository {
    async fn list_candidates(&self, params: &CandidateListParams) -> Result<Vec<Candidate>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .candidates
            .values()
            .filter(|c| params.matches(c))
            .cloned()
            .collect())
    }

    async fn find_candidate(&self, code: &str) -> Result<Option<Candidate>, AppError> {
        Ok(self.tables.read().await.candidates.get(code).cloned())
    }

    async fn insert_candidate(&self, candidate: &Candidate) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if tables.candidates.contains_key(&candidate.code) {
            return Err(AppError::Conflict(format!(
                "Exam code '{}' already exists",
                candidate.code
            )));
        }
        let mut stored = candidate.clone();
        stored.created_at.get_or_insert_with(chrono::Utc::now);
        tables.candidates.insert(stored.code.clone(), stored);
        Ok(())
    }

    async fn update_candidate(&self, candidate: &Candidate) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        match tables.candidates.get_mut(&candidate.code) {
            Some(existing) => {
                *existing = candidate.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("Candidate not found".to_string())),
        }
    }

    async fn delete_candidates(&self, codes: &[String]) -> Result<u64, AppError> {
        let mut tables = self.tables.write().await;
        let removed = codes
            .iter()
            .filter(|code| tables.candidates.remove(code.as_str()).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn replace_candidates(&self, candidates: &[Candidate]) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        tables.candidates = candidates
            .iter()
            .map(|c| (c.code.clone(), c.clone()))
            .collect();
        Ok(())
    }

    async fn set_code_used(&self, code: &str, used: bool) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        if let Some(candidate) = tables.candidates.get_mut(code) {
            candidate.code_used = used;
        }
        Ok(())
    }

    async fn count_candidates(&self) -> Result<i64, AppError> {
        Ok(self.tables.read().await.candidates.len() as i64)
    }
}

#[async_trait]
impl QuestionRepository for MemoryRepository {
    async fn list_questions(&self, params: &QuestionListParams) -> Result<Vec<Question>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .questions
            .values()
            .filter(|q| question_matches(params, q))
            .cloned()
            .collect())
    }

    async fn find_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        Ok(self.tables.read().await.questions.get(&id).cloned())
    }

    async fn insert_question(&self, question: &Question) -> Result<Question, AppError> {
        let mut tables = self.tables.write().await;
        tables.last_question_id += 1;
        let mut stored = question.clone();
        stored.id = tables.last_question_id;
        stored.created_at = Some(chrono::Utc::now());
        tables.questions.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_question(&self, question: &Question) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        match tables.questions.get_mut(&question.id) {
            Some(existing) => {
                *existing = question.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("Question not found".to_string())),
        }
    }

    async fn delete_question(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.tables.write().await.questions.remove(&id).is_some())
    }

    async fn count_questions(&self) -> Result<i64, AppError> {
        Ok(self.tables.read().await.questions.len() as i64)
    }
}

#[async_trait]
impl ResultRepository for MemoryRepository {
    async fn list_results(&self, params: &ResultListParams) -> Result<Vec<ExamResult>, AppError> {
        let tables = self.tables.read().await;
        let mut results: Vec<ExamResult> = tables
            .results
            .iter()
            .filter(|r| params.matches(r))
            .cloned()
            .collect();
        results.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(results)
    }

    async fn find_result(&self, id: Uuid) -> Result<Option<ExamResult>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.results.iter().find(|r| r.id == id).cloned())
    }

    async fn delete_result(&self, id: Uuid) -> Result<Option<ExamResult>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(pos) = tables.results.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        Ok(Some(tables.results.remove(pos)))
    }

    async fn delete_all_results(&self) -> Result<u64, AppError> {
        let mut tables = self.tables.write().await;
        let removed = tables.results.len() as u64;
        tables.results.clear();
        for candidate in tables.candidates.values_mut() {
            candidate.code_used = false;
        }
        Ok(removed)
    }

    async fn result_stats(&self) -> Result<(i64, i64, Option<f64>), AppError> {
        let tables = self.tables.read().await;
        let total = tables.results.len() as i64;
        let flagged = tables
            .results
            .iter()
            .filter(|r| r.status == ResultStatus::Flagged)
            .count() as i64;
        let average = if total == 0 {
            None
        } else {
            let sum: u64 = tables.results.iter().map(|r| r.score as u64).sum();
            Some(sum as f64 / total as f64)
        };
        Ok((total, flagged, average))
    }
}

#[async_trait]
impl AlertRepository for MemoryRepository {
    async fn append_alert(&self, alert: &IntegrityAlert) -> Result<(), AppError> {
        self.tables.write().await.alerts.push(alert.clone());
        Ok(())
    }

    async fn list_alerts(&self, params: &AlertListParams) -> Result<Vec<IntegrityAlert>, AppError> {
        let tables = self.tables.read().await;
        let mut alerts: Vec<IntegrityAlert> = tables
            .alerts
            .iter()
            .filter(|a| params.matches(a))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    async fn set_alert_status(&self, ids: &[Uuid], status: AlertStatus) -> Result<u64, AppError> {
        let mut tables = self.tables.write().await;
        let mut updated = 0;
        for alert in tables.alerts.iter_mut().filter(|a| ids.contains(&a.id)) {
            alert.status = status;
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_alerts(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        let mut tables = self.tables.write().await;
        let before = tables.alerts.len();
        tables.alerts.retain(|a| !ids.contains(&a.id));
        Ok((before - tables.alerts.len()) as u64)
    }

    async fn alert_counts(&self) -> Result<(i64, i64), AppError> {
        let tables = self.tables.read().await;
        let active = tables
            .alerts
            .iter()
            .filter(|a| a.status == AlertStatus::Active)
            .count() as i64;
        Ok((tables.alerts.len() as i64, active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        exam::SubmitTrigger,
        models::{
            candidate::CandidateStatus,
            question::{AnswerValue, QuestionKind},
        },
    };

    fn result_for(code: &str) -> ExamResult {
        ExamResult {
            id: Uuid::new_v4(),
            exam_code: code.to_string(),
            user_name: "Mina".to_string(),
            church: String::new(),
            category: "كشافة".to_string(),
            score: 80,
            correct_answers: 4,
            total_questions: 5,
            answers: Default::default(),
            tab_switches: 0,
            duration_secs: 120,
            trigger: SubmitTrigger::Student,
            status: ResultStatus::Completed,
            submitted_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_consumes_code_and_rejects_duplicates() {
        let repo = MemoryRepository::new();
        repo.insert_candidate(&Candidate {
            code: "S-1".to_string(),
            name: "Mina".to_string(),
            church: String::new(),
            category: "كشافة".to_string(),
            password: String::new(),
            email: String::new(),
            status: CandidateStatus::Active,
            code_used: false,
            created_at: None,
        })
        .await
        .unwrap();

        assert_eq!(repo.append(&result_for("S-1")).await.unwrap(), AppendOutcome::Appended);
        assert_eq!(repo.append(&result_for("S-1")).await.unwrap(), AppendOutcome::Duplicate);
        assert!(repo.find_candidate("S-1").await.unwrap().unwrap().code_used);
        assert_eq!(repo.result_stats().await.unwrap().0, 1);
    }

    #[tokio::test]
    async fn for_category_includes_shared_questions_in_id_order() {
        let repo = MemoryRepository::new();
        for category in [Some("Rovers"), None, Some("Cubs")] {
            repo.insert_question(&Question {
                id: 0,
                text: "Q".to_string(),
                kind: QuestionKind::TrueFalse,
                options: Vec::new(),
                correct_answer: AnswerValue::Flag(true),
                category: category.map(str::to_string),
                image_url: None,
                created_at: None,
            })
            .await
            .unwrap();
        }

        let ids: Vec<i64> = repo
            .for_category("Cubs")
            .await
            .unwrap()
            .iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
