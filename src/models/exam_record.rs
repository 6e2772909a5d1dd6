// src/models/exam_record.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::exam::{AnswerMap, SubmitTrigger};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// Submitted by the candidate or by the clock.
    Completed,
    /// Ended by the integrity monitor.
    Flagged,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Completed => "completed",
            ResultStatus::Flagged => "flagged",
        }
    }

    pub fn parse(raw: &str) -> Self {
        if raw == "flagged" {
            ResultStatus::Flagged
        } else {
            ResultStatus::Completed
        }
    }
}

/// The graded outcome of one exam attempt. Written once, never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamResult {
    pub id: Uuid,
    pub exam_code: String,
    pub user_name: String,
    pub church: String,
    pub category: String,
    /// Percentage, 0..=100.
    pub score: u32,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub answers: AnswerMap,
    pub tab_switches: u32,
    /// Seconds between the start of the session and its submission.
    pub duration_secs: u64,
    pub trigger: SubmitTrigger,
    pub status: ResultStatus,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// Outcome of handing a result to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// A result for this exam code already exists; nothing was written.
    Duplicate,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResultListParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_score: Option<u32>,
    pub has_alerts: Option<bool>,
}

impl ResultListParams {
    pub fn matches(&self, result: &ExamResult) -> bool {
        if let Some(category) = self.category.as_deref() {
            if !category.is_empty() && category != "all" && result.category != category {
                return false;
            }
        }
        if let Some(min) = self.min_score {
            if result.score < min {
                return false;
            }
        }
        if self.has_alerts == Some(true) && result.tab_switches == 0 {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term_lower = term.to_lowercase();
                result.user_name.to_lowercase().contains(&term_lower)
                    || result.exam_code.contains(term)
                    || result.church.to_lowercase().contains(&term_lower)
            }
        }
    }
}

/// Aggregated counters for the admin dashboard.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SystemStats {
    pub total_candidates: i64,
    pub total_questions: i64,
    pub total_results: i64,
    pub flagged_results: i64,
    pub total_alerts: i64,
    pub active_alerts: i64,
    pub live_sessions: i64,
    pub average_score: Option<f64>,
}
