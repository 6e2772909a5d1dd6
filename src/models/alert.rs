// src/models/alert.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    TabSwitch,
    AutoSubmit,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::TabSwitch => "tab_switch",
            AlertKind::AutoSubmit => "auto_submit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
        }
    }

    /// Severity grows as the count approaches the auto-submit threshold.
    pub fn for_count(count: u32, threshold: u32) -> Self {
        if count >= threshold {
            AlertSeverity::High
        } else if count + 1 >= threshold {
            AlertSeverity::Medium
        } else {
            AlertSeverity::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Active,
    Reviewed,
    Cleared,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Reviewed => "reviewed",
            AlertStatus::Cleared => "cleared",
        }
    }
}

/// One integrity event recorded during an exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityAlert {
    pub id: Uuid,
    pub exam_code: String,
    pub user_name: String,
    pub church: String,
    pub category: String,
    pub kind: AlertKind,
    pub tab_switches: u32,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub details: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertListParams {
    pub status: Option<AlertStatus>,
    pub exam_code: Option<String>,
}

impl AlertListParams {
    pub fn matches(&self, alert: &IntegrityAlert) -> bool {
        self.status.is_none_or(|s| alert.status == s)
            && self
                .exam_code
                .as_deref()
                .is_none_or(|code| alert.exam_code == code)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateAlertRequest {
    pub status: AlertStatus,
}

#[derive(Debug, Deserialize)]
pub struct BulkAlertStatusRequest {
    pub ids: Vec<Uuid>,
    pub status: AlertStatus,
}

#[derive(Debug, Deserialize)]
pub struct BulkAlertDeleteRequest {
    pub ids: Vec<Uuid>,
}
