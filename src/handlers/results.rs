// src/handlers/results.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::admin::csv_download,
    models::{
        alert::{AlertListParams, BulkAlertDeleteRequest, BulkAlertStatusRequest, UpdateAlertRequest},
        exam_record::ResultListParams,
    },
    state::AppState,
    utils::csv,
};

/// Lists results, newest first.
/// Admin only.
pub async fn list_results(
    State(state): State<AppState>,
    Query(params): Query<ResultListParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.repos.results.list_results(&params).await?))
}

pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = state
        .repos
        .results
        .find_result(id)
        .await?
        .ok_or(AppError::NotFound("Result not found".to_string()))?;
    Ok(Json(result))
}

/// Deletes a result record. The exam code stays consumed.
/// Admin only.
pub async fn delete_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .repos
        .results
        .delete_result(id)
        .await?
        .ok_or(AppError::NotFound("Result not found".to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Administrative reset: removes the record and frees the exam code so the
/// candidate can sit the exam again.
/// Admin only.
pub async fn reset_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let removed = state
        .repos
        .results
        .delete_result(id)
        .await?
        .ok_or(AppError::NotFound("Result not found".to_string()))?;

    state
        .repos
        .candidates
        .set_code_used(&removed.exam_code, false)
        .await?;
    state.sessions.remove(&removed.exam_code).await;

    tracing::warn!("Exam code {} was reset by an admin", removed.exam_code);
    Ok(Json(json!({ "message": "Result reset", "exam_code": removed.exam_code })))
}

/// Removes every result and frees every exam code.
/// Admin only.
pub async fn delete_all_results(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let deleted = state.repos.results.delete_all_results().await?;
    state.sessions.prune_locked().await;

    tracing::warn!("All {} results were deleted by an admin", deleted);
    Ok(Json(json!({ "deleted": deleted })))
}

/// Exports every result as CSV.
/// Admin only.
pub async fn export_results(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let results = state
        .repos
        .results
        .list_results(&ResultListParams::default())
        .await?;

    let rows: Vec<Vec<String>> = results
        .into_iter()
        .map(|r| {
            vec![
                r.exam_code,
                r.user_name,
                r.church,
                r.category,
                r.score.to_string(),
                r.correct_answers.to_string(),
                r.total_questions.to_string(),
                r.tab_switches.to_string(),
                r.duration_secs.to_string(),
                r.trigger.as_str().to_string(),
                r.status.as_str().to_string(),
                r.submitted_at.to_rfc3339(),
            ]
        })
        .collect();

    let body = csv::write_document(
        &[
            "Code",
            "Name",
            "Church",
            "Category",
            "Score",
            "Correct",
            "Total",
            "Tab Switches",
            "Duration (s)",
            "Trigger",
            "Status",
            "Submitted At",
        ],
        &rows,
    );
    Ok(csv_download("results.csv", body))
}

/// Lists integrity alerts, newest first.
/// Admin only.
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertListParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.repos.alerts.list_alerts(&params).await?))
}

/// Marks an alert as reviewed or cleared.
/// Admin only.
pub async fn update_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAlertRequest>,
) -> Result<impl IntoResponse, AppError> {
    if state.repos.alerts.set_alert_status(&[id], payload.status).await? == 0 {
        return Err(AppError::NotFound("Alert not found".to_string()));
    }
    Ok(StatusCode::OK)
}

pub async fn delete_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if state.repos.alerts.delete_alerts(&[id]).await? == 0 {
        return Err(AppError::NotFound("Alert not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Applies one status to every selected alert.
/// Admin only.
pub async fn bulk_update_alerts(
    State(state): State<AppState>,
    Json(payload): Json<BulkAlertStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.ids.is_empty() {
        return Err(AppError::BadRequest("No alerts selected".to_string()));
    }

    let updated = state
        .repos
        .alerts
        .set_alert_status(&payload.ids, payload.status)
        .await?;
    tracing::info!("{} alerts marked {}", updated, payload.status.as_str());
    Ok(Json(json!({ "updated": updated })))
}

pub async fn bulk_delete_alerts(
    State(state): State<AppState>,
    Json(payload): Json<BulkAlertDeleteRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.ids.is_empty() {
        return Err(AppError::BadRequest("No alerts selected".to_string()));
    }

    let deleted = state.repos.alerts.delete_alerts(&payload.ids).await?;
    tracing::info!("{} alerts deleted", deleted);
    Ok(Json(json!({ "deleted": deleted })))
}

/// Exports the alerts matching the list filters as CSV.
/// Admin only.
pub async fn export_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertListParams>,
) -> Result<impl IntoResponse, AppError> {
    let alerts = state.repos.alerts.list_alerts(&params).await?;

    let rows: Vec<Vec<String>> = alerts
        .into_iter()
        .map(|a| {
            vec![
                a.exam_code,
                a.user_name,
                a.church,
                a.category,
                a.kind.as_str().to_string(),
                a.created_at.to_rfc3339(),
                a.tab_switches.to_string(),
                a.status.as_str().to_string(),
                a.severity.as_str().to_string(),
                a.details,
            ]
        })
        .collect();

    let body = csv::write_document(
        &[
            "Code",
            "Name",
            "Church",
            "Category",
            "Kind",
            "Time",
            "Tab Switches",
            "Status",
            "Severity",
            "Details",
        ],
        &rows,
    );
    Ok(csv_download("alerts.csv", body))
}
