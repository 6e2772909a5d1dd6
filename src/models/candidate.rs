// src/models/candidate.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::{CATEGORIES, EXAM_CODE_PATTERN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    #[default]
    Active,
    Inactive,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Active => "active",
            CandidateStatus::Inactive => "inactive",
        }
    }

    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("inactive") {
            CandidateStatus::Inactive
        } else {
            CandidateStatus::Active
        }
    }
}

/// A candidate registered for the exam, identified by a one-time exam code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// One-time login code; also correlates the session with its result.
    pub code: String,

    pub name: String,

    pub church: String,

    pub category: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub email: String,

    pub status: CandidateStatus,

    /// Set once a result has been recorded for this code.
    pub code_used: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Candidate {
    pub fn identity(&self) -> CandidateIdentity {
        CandidateIdentity {
            code: self.code.clone(),
            name: self.name.clone(),
            church: self.church.clone(),
            category: self.category.clone(),
        }
    }
}

/// The authenticated identity an exam session runs under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateIdentity {
    pub code: String,
    pub name: String,
    pub church: String,
    pub category: String,
}

/// DTO for creating a candidate from the admin dashboard.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCandidateRequest {
    #[validate(regex(path = *EXAM_CODE_PATTERN, message = "Exam code must be 3 to 32 letters, digits, '-' or '_'."))]
    pub code: String,
    #[validate(length(min = 1, max = 100, message = "Name is required."))]
    pub name: String,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub church: String,
    #[validate(custom(function = validate_category))]
    pub category: String,
    #[validate(length(min = 4, max = 128, message = "Password length must be between 4 and 128 characters."))]
    pub password: String,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub status: CandidateStatus,
}

/// DTO for updating a candidate. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCandidateRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub church: Option<String>,
    #[validate(custom(function = validate_category))]
    pub category: Option<String>,
    #[validate(length(min = 4, max = 128))]
    pub password: Option<String>,
    #[validate(length(max = 200))]
    pub email: Option<String>,
    pub status: Option<CandidateStatus>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateListParams {
    pub search: Option<String>,
    pub category: Option<String>,
}

impl CandidateListParams {
    /// Case-insensitive match on name and church, substring match on code.
    pub fn matches(&self, candidate: &Candidate) -> bool {
        let category_ok = match self.category.as_deref() {
            None | Some("") | Some("all") => true,
            Some(c) => candidate.category == c,
        };
        let search_ok = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term_lower = term.to_lowercase();
                candidate.name.to_lowercase().contains(&term_lower)
                    || candidate.code.contains(term)
                    || candidate.church.to_lowercase().contains(&term_lower)
            }
        };
        category_ok && search_ok
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub codes: Vec<String>,
}

/// DTO for login. Used for both the admin and exam candidates.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

pub fn validate_category(category: &str) -> Result<(), validator::ValidationError> {
    if CATEGORIES.contains(&category) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("unknown_category"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(code: &str, name: &str, church: &str, category: &str) -> Candidate {
        Candidate {
            code: code.to_string(),
            name: name.to_string(),
            church: church.to_string(),
            category: category.to_string(),
            password: String::new(),
            email: String::new(),
            status: CandidateStatus::Active,
            code_used: false,
            created_at: None,
        }
    }

    #[test]
    fn list_params_filter_on_search_and_category() {
        let c = candidate("S-1001", "Mina Adel", "St. Mark", CATEGORIES[2]);
        let by_name = CandidateListParams {
            search: Some("mina".to_string()),
            category: None,
        };
        let by_code = CandidateListParams {
            search: Some("1001".to_string()),
            category: Some("all".to_string()),
        };
        let wrong_category = CandidateListParams {
            search: None,
            category: Some(CATEGORIES[0].to_string()),
        };
        assert!(by_name.matches(&c));
        assert!(by_code.matches(&c));
        assert!(!wrong_category.matches(&c));
    }

    #[test]
    fn create_request_validates_code_and_category() {
        let ok = CreateCandidateRequest {
            code: "S-1001".to_string(),
            name: "Mina".to_string(),
            church: String::new(),
            category: CATEGORIES[0].to_string(),
            password: "pass1234".to_string(),
            email: String::new(),
            status: CandidateStatus::Active,
        };
        assert!(ok.validate().is_ok());

        let mut bad = ok.clone();
        bad.code = "x".to_string();
        assert!(bad.validate().is_err());

        let mut bad = ok;
        bad.category = "Pilots".to_string();
        assert!(bad.validate().is_err());
    }
}
