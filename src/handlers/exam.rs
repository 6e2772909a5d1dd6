// src/handlers/exam.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    exam::{MonitorVerdict, SessionHandle, SubmitTrigger},
    models::{
        alert::{AlertKind, AlertSeverity, AlertStatus, IntegrityAlert},
        question::AnswerValue,
    },
    state::AppState,
    utils::jwt::Claims,
};

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub answer: AnswerValue,
}

async fn session_for(state: &AppState, claims: &Claims) -> Result<SessionHandle, AppError> {
    Ok(state.sessions.get(&claims.sub).await?)
}

/// Starts the candidate's exam, or resumes it after a page reload.
pub async fn start_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state
        .sessions
        .start_or_resume(
            claims.identity(),
            state.repos.question_source.as_ref(),
            state.repos.result_store.clone(),
            state.config.exam_policy(),
        )
        .await?;

    Ok(Json(handle.snapshot().await))
}

pub async fn get_state(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let handle = session_for(&state, &claims).await?;
    Ok(Json(handle.snapshot().await))
}

/// Stores the answer for one question. Selecting again replaces it.
pub async fn save_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(question_id): Path<i64>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let handle = session_for(&state, &claims).await?;
    handle.set_answer(question_id, payload.answer).await?;
    Ok(Json(handle.snapshot().await))
}

pub async fn next_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let handle = session_for(&state, &claims).await?;
    handle.next().await?;
    Ok(Json(handle.snapshot().await))
}

pub async fn previous_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let handle = session_for(&state, &claims).await?;
    handle.previous().await?;
    Ok(Json(handle.snapshot().await))
}

/// Reports that the exam page lost visibility (tab switch, window blur).
///
/// Every counted event is logged as an integrity alert for the admin
/// dashboard. The response carries the verdict the page has to act on.
pub async fn visibility_lost(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let handle = session_for(&state, &claims).await?;
    let verdict = handle.visibility_lost().await?;
    let threshold = state.config.exam_policy().integrity.threshold;

    let alert = match verdict {
        MonitorVerdict::Warning { count, threshold } => Some((
            AlertKind::TabSwitch,
            count,
            format!("Left the exam page ({}/{})", count, threshold),
        )),
        MonitorVerdict::ScheduleAutoSubmit { count, grace } => Some((
            AlertKind::AutoSubmit,
            count,
            format!(
                "Tab switch limit reached; exam submitted automatically after {}s",
                grace.as_secs()
            ),
        )),
        MonitorVerdict::FinalWarning { count } => Some((
            AlertKind::TabSwitch,
            count,
            format!("Left the exam page again during the final warning ({})", count),
        )),
        MonitorVerdict::Ignored => None,
    };

    if let Some((kind, count, details)) = alert {
        let identity = handle.identity();
        let record = IntegrityAlert {
            id: Uuid::new_v4(),
            exam_code: identity.code.clone(),
            user_name: identity.name.clone(),
            church: identity.church.clone(),
            category: identity.category.clone(),
            kind,
            tab_switches: count,
            severity: AlertSeverity::for_count(count, threshold),
            status: AlertStatus::Active,
            details,
            created_at: chrono::Utc::now(),
        };
        // The event itself is already counted; a lost alert row must not fail it.
        if let Err(e) = state.repos.alerts.append_alert(&record).await {
            tracing::error!("Failed to log integrity alert for {}: {:?}", identity.code, e);
        }
    }

    Ok(Json(json!({
        "verdict": verdict,
        "state": handle.snapshot().await,
    })))
}

/// Manual submission. Only allowed from the last question.
pub async fn submit_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let handle = session_for(&state, &claims).await?;
    let result = handle.submit(SubmitTrigger::Student).await?;

    Ok(Json(json!({
        "message": "Exam submitted successfully",
        "result": result,
    })))
}
