// src/handlers/questions.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::admin::{ImportReport, csv_download},
    models::{
        candidate::validate_category,
        question::{
            AnswerValue, CreateQuestionRequest, Question, QuestionKind, QuestionListParams,
            UpdateQuestionRequest,
        },
    },
    state::AppState,
    utils::{csv, html::clean_text},
};

const QUESTION_HEADER: [&str; 10] = [
    "Category",
    "Type",
    "Question",
    "Question EN",
    "Option 1",
    "Option 2",
    "Option 3",
    "Option 4",
    "Correct Answer",
    "Image",
];

/// Sanitizes the text fields and checks that the question can be asked.
fn prepare(mut question: Question) -> Result<Question, AppError> {
    question.text = clean_text(&question.text);
    question.options = question
        .options
        .iter()
        .map(|o| clean_text(o))
        .filter(|o| !o.is_empty())
        .collect();
    question.category = question
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    if question.text.is_empty() {
        return Err(AppError::BadRequest("Question text is required".to_string()));
    }
    if let Some(category) = question.category.as_deref() {
        validate_category(category)
            .map_err(|_| AppError::BadRequest(format!("Unknown category '{}'", category)))?;
    }
    question.check_shape().map_err(AppError::BadRequest)?;
    Ok(question)
}

/// Lists the question bank, including answer keys.
/// Admin only.
pub async fn list_questions(
    State(state): State<AppState>,
    Query(params): Query<QuestionListParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.repos.questions.list_questions(&params).await?))
}

/// Creates a new question.
/// Admin only.
pub async fn create_question(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let question = prepare(Question {
        id: 0,
        text: payload.text,
        kind: payload.kind,
        options: payload.options,
        correct_answer: payload.correct_answer,
        category: payload.category,
        image_url: payload.image_url.filter(|u| !u.trim().is_empty()),
        created_at: None,
    })?;

    let stored = state.repos.questions.insert_question(&question).await?;
    tracing::info!("Question {} created", stored.id);

    Ok((StatusCode::CREATED, Json(stored)))
}

/// Updates a question by ID. Running exams keep the version they loaded.
/// Admin only.
pub async fn update_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut question = state
        .repos
        .questions
        .find_question(id)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    if payload.is_empty() {
        return Ok(Json(question));
    }

    payload.apply(&mut question);
    let question = prepare(question)?;
    state.repos.questions.update_question(&question).await?;

    Ok(Json(question))
}

/// Deletes a question by ID.
/// Admin only.
pub async fn delete_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !state.repos.questions.delete_question(id).await? {
        return Err(AppError::NotFound("Question not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Reads one import line. Multiple-choice keys are 1-based in the file.
fn question_from_fields(fields: &[String]) -> Result<Question, String> {
    if fields.len() < 9 {
        return Err(format!("expected at least 9 fields, found {}", fields.len()));
    }

    let kind = QuestionKind::parse(&fields[1])
        .ok_or_else(|| format!("unknown question type '{}'", fields[1]))?;

    let correct_answer = match (kind, AnswerValue::parse_key(&fields[8])) {
        (QuestionKind::MultipleChoice, Some(AnswerValue::Choice(n))) if n >= 1 => {
            AnswerValue::Choice(n - 1)
        }
        (QuestionKind::TrueFalse, Some(flag @ AnswerValue::Flag(_))) => flag,
        _ => return Err(format!("invalid correct answer '{}'", fields[8])),
    };

    let options = match kind {
        QuestionKind::MultipleChoice => fields[4..8]
            .iter()
            .filter(|o| !o.is_empty())
            .cloned()
            .collect(),
        QuestionKind::TrueFalse => Vec::new(),
    };

    Ok(Question {
        id: 0,
        text: fields[2].clone(),
        kind,
        options,
        correct_answer,
        category: Some(fields[0].clone()),
        image_url: fields.get(9).filter(|u| !u.is_empty()).cloned(),
        created_at: None,
    })
}

/// Imports questions from CSV
/// (category,type,question,question_en,option1..4,correct,image).
/// Admin only.
pub async fn import_questions(
    State(state): State<AppState>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let mut report = ImportReport::default();

    for record in csv::parse_document(&body) {
        let question = match question_from_fields(&record.fields) {
            Ok(q) => q,
            Err(reason) => {
                report.reject(record.line, reason);
                continue;
            }
        };
        let question = match prepare(question) {
            Ok(q) => q,
            Err(AppError::BadRequest(reason)) => {
                report.reject(record.line, reason);
                continue;
            }
            Err(e) => return Err(e),
        };

        state.repos.questions.insert_question(&question).await?;
        report.imported += 1;
    }

    tracing::info!(
        "Question import: {} imported, {} skipped",
        report.imported,
        report.skipped
    );
    Ok(Json(report))
}

/// A sample file for the question import.
/// Admin only.
pub async fn question_template() -> impl IntoResponse {
    let rows = vec![
        vec![
            "جوالة", "mcq", "من صفات الجوال؟", "", "الاتكال على الغير", "التعاون", "السلبية", "التردد",
            "2", "",
        ],
        vec!["كشافة", "truefalse", "الكشاف صديق للحيوان", "", "", "", "", "", "true", ""],
    ];
    csv_download("questions_template.csv", csv::write_document(&QUESTION_HEADER, &rows))
}
