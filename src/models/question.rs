// src/models/question.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A candidate's selection for one question, and the shape of a question's key.
///
/// Multiple-choice questions are answered with a zero-based option index,
/// true/false questions with a boolean. The two never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Flag(bool),
    Choice(u32),
}

impl AnswerValue {
    /// Parses the textual form used by CSV files: `true`/`false` or an index.
    pub fn parse_key(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match raw.to_ascii_lowercase().as_str() {
            "true" | "صحيح" => Some(AnswerValue::Flag(true)),
            "false" | "خطأ" => Some(AnswerValue::Flag(false)),
            _ => raw.parse::<u32>().ok().map(AnswerValue::Choice),
        }
    }
}

impl std::fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerValue::Flag(b) => write!(f, "{}", b),
            AnswerValue::Choice(i) => write!(f, "{}", i),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionKind {
    #[serde(rename = "mcq")]
    MultipleChoice,
    #[serde(rename = "truefalse")]
    TrueFalse,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "mcq",
            QuestionKind::TrueFalse => "truefalse",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mcq" | "multiple" | "multiple-choice" => Some(QuestionKind::MultipleChoice),
            "truefalse" | "true/false" | "tf" => Some(QuestionKind::TrueFalse),
            _ => None,
        }
    }
}

/// A question from the bank. Immutable once loaded into a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// The question text shown to the candidate.
    pub text: String,

    #[serde(rename = "type")]
    pub kind: QuestionKind,

    /// Option labels. Empty for true/false questions.
    #[serde(default)]
    pub options: Vec<String>,

    pub correct_answer: AnswerValue,

    /// Category tag; `None` means the question is shared by every category.
    pub category: Option<String>,

    pub image_url: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Question {
    /// Whether `answer` is a well-formed selection for this question.
    pub fn accepts(&self, answer: &AnswerValue) -> bool {
        match (self.kind, answer) {
            (QuestionKind::MultipleChoice, AnswerValue::Choice(idx)) => {
                (*idx as usize) < self.options.len()
            }
            (QuestionKind::TrueFalse, AnswerValue::Flag(_)) => true,
            _ => false,
        }
    }

    /// Checks that options and key agree with the question kind.
    pub fn check_shape(&self) -> Result<(), String> {
        match self.kind {
            QuestionKind::MultipleChoice if self.options.len() < 2 => {
                Err("multiple-choice questions need at least two options".to_string())
            }
            QuestionKind::TrueFalse if !self.options.is_empty() => {
                Err("true/false questions take no options".to_string())
            }
            _ if !self.accepts(&self.correct_answer) => Err(format!(
                "correct answer '{}' does not fit a {} question",
                self.correct_answer,
                self.kind.as_str()
            )),
            _ => Ok(()),
        }
    }

    /// True when the question applies to candidates of `category`.
    pub fn applies_to(&self, category: &str) -> bool {
        match self.category.as_deref() {
            None | Some("") => true,
            Some(c) => c == category,
        }
    }
}

/// DTO for sending a question to a candidate (excludes the key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub options: Vec<String>,
    pub image_url: Option<String>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            text: q.text.clone(),
            kind: q.kind,
            options: q.options.clone(),
            image_url: q.image_url.clone(),
        }
    }
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(default)]
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    pub correct_answer: AnswerValue,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(custom(function = validate_image_url))]
    pub image_url: Option<String>,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub text: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<QuestionKind>,
    #[validate(custom(function = validate_options))]
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<AnswerValue>,
    /// `Some("")` clears the category.
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(custom(function = validate_image_url))]
    pub image_url: Option<String>,
}

impl UpdateQuestionRequest {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.kind.is_none()
            && self.options.is_none()
            && self.correct_answer.is_none()
            && self.category.is_none()
            && self.image_url.is_none()
    }

    /// Applies the present fields on top of `question`.
    pub fn apply(self, question: &mut Question) {
        if let Some(text) = self.text {
            question.text = text;
        }
        if let Some(kind) = self.kind {
            question.kind = kind;
            if kind == QuestionKind::TrueFalse && self.options.is_none() {
                question.options.clear();
            }
        }
        if let Some(options) = self.options {
            question.options = options;
        }
        if let Some(answer) = self.correct_answer {
            question.correct_answer = answer;
        }
        if let Some(category) = self.category {
            question.category = if category.trim().is_empty() {
                None
            } else {
                Some(category)
            };
        }
        if let Some(url) = self.image_url {
            question.image_url = if url.trim().is_empty() { None } else { Some(url) };
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QuestionListParams {
    pub category: Option<String>,
    pub search: Option<String>,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    for opt in options {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

fn validate_image_url(url: &str) -> Result<(), validator::ValidationError> {
    if url.is_empty() {
        return Ok(());
    }
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(validator::ValidationError::new("invalid_image_url")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq(options: &[&str], key: u32) -> Question {
        Question {
            id: 1,
            text: "Which knot joins two ropes?".to_string(),
            kind: QuestionKind::MultipleChoice,
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answer: AnswerValue::Choice(key),
            category: None,
            image_url: None,
            created_at: None,
        }
    }

    #[test]
    fn answer_value_deserializes_by_json_type() {
        let flag: AnswerValue = serde_json::from_str("true").unwrap();
        let choice: AnswerValue = serde_json::from_str("2").unwrap();
        assert_eq!(flag, AnswerValue::Flag(true));
        assert_eq!(choice, AnswerValue::Choice(2));
        assert_ne!(AnswerValue::Choice(1), AnswerValue::Flag(true));
    }

    #[test]
    fn accepts_checks_range_and_kind() {
        let q = mcq(&["Reef", "Sheet bend", "Bowline"], 1);
        assert!(q.accepts(&AnswerValue::Choice(2)));
        assert!(!q.accepts(&AnswerValue::Choice(3)));
        assert!(!q.accepts(&AnswerValue::Flag(false)));
    }

    #[test]
    fn check_shape_rejects_out_of_range_key() {
        assert!(mcq(&["A", "B"], 1).check_shape().is_ok());
        assert!(mcq(&["A", "B"], 5).check_shape().is_err());
        assert!(mcq(&["A"], 0).check_shape().is_err());
    }

    #[test]
    fn uncategorised_questions_apply_everywhere() {
        let mut q = mcq(&["A", "B"], 0);
        assert!(q.applies_to("Cubs"));
        q.category = Some("Rovers".to_string());
        assert!(!q.applies_to("Cubs"));
        assert!(q.applies_to("Rovers"));
    }

    #[test]
    fn parse_key_understands_csv_forms() {
        assert_eq!(AnswerValue::parse_key(" TRUE "), Some(AnswerValue::Flag(true)));
        assert_eq!(AnswerValue::parse_key("3"), Some(AnswerValue::Choice(3)));
        assert_eq!(AnswerValue::parse_key("maybe"), None);
    }
}
