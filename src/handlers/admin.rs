// src/handlers/admin.rs

use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        candidate::{
            BulkDeleteRequest, Candidate, CandidateListParams, CandidateStatus,
            CreateCandidateRequest, UpdateCandidateRequest,
        },
        exam_record::SystemStats,
    },
    state::AppState,
    utils::{
        csv,
        hash::{hash_optional, hash_password},
    },
};

const CANDIDATE_HEADER: [&str; 6] = ["Code", "Name", "Church", "Category", "Password", "Email"];

/// Outcome of a CSV import. Rejected lines are reported, not fatal.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl ImportReport {
    pub fn reject(&mut self, line: usize, reason: impl std::fmt::Display) {
        self.skipped += 1;
        self.errors.push(format!("Line {}: {}", line, reason));
    }
}

#[derive(Debug, Deserialize)]
pub struct ImportParams {
    #[serde(default)]
    pub replace: bool,
}

/// Wraps a CSV document as a file download.
pub fn csv_download(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

/// Lists candidates, filtered by name/code/church and category.
/// Admin only.
pub async fn list_candidates(
    State(state): State<AppState>,
    Query(params): Query<CandidateListParams>,
) -> Result<impl IntoResponse, AppError> {
    let candidates = state.repos.candidates.list_candidates(&params).await?;
    Ok(Json(candidates))
}

/// Registers a new exam code.
/// Admin only.
pub async fn create_candidate(
    State(state): State<AppState>,
    Json(payload): Json<CreateCandidateRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let candidate = Candidate {
        code: payload.code.trim().to_string(),
        name: payload.name.trim().to_string(),
        church: payload.church.trim().to_string(),
        category: payload.category,
        password: hash_password(&payload.password)?,
        email: payload.email.trim().to_string(),
        status: payload.status,
        code_used: false,
        created_at: Some(chrono::Utc::now()),
    };

    state.repos.candidates.insert_candidate(&candidate).await?;
    tracing::info!("Candidate {} created", candidate.code);

    Ok((StatusCode::CREATED, Json(candidate)))
}

/// Updates a candidate by exam code.
/// Admin only.
pub async fn update_candidate(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(payload): Json<UpdateCandidateRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut candidate = state
        .repos
        .candidates
        .find_candidate(&code)
        .await?
        .ok_or(AppError::NotFound("Candidate not found".to_string()))?;

    if let Some(name) = payload.name {
        candidate.name = name.trim().to_string();
    }
    if let Some(church) = payload.church {
        candidate.church = church.trim().to_string();
    }
    if let Some(category) = payload.category {
        candidate.category = category;
    }
    if let Some(password) = payload.password {
        candidate.password = hash_password(&password)?;
    }
    if let Some(email) = payload.email {
        candidate.email = email.trim().to_string();
    }
    if let Some(status) = payload.status {
        candidate.status = status;
    }

    state.repos.candidates.update_candidate(&candidate).await?;
    Ok(Json(candidate))
}

/// Deletes a candidate by exam code. A running exam for the code is dropped.
/// Admin only.
pub async fn delete_candidate(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let removed = state
        .repos
        .candidates
        .delete_candidates(std::slice::from_ref(&code))
        .await?;

    if removed == 0 {
        return Err(AppError::NotFound("Candidate not found".to_string()));
    }

    state.sessions.remove(&code).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Deletes the selected candidates.
/// Admin only.
pub async fn bulk_delete_candidates(
    State(state): State<AppState>,
    Json(payload): Json<BulkDeleteRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.codes.is_empty() {
        return Err(AppError::BadRequest("No exam codes selected".to_string()));
    }

    let deleted = state.repos.candidates.delete_candidates(&payload.codes).await?;
    for code in &payload.codes {
        state.sessions.remove(code).await;
    }

    tracing::info!("Bulk-deleted {} candidates", deleted);
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

/// Imports candidates from CSV (code,name,church,category,password,email).
///
/// With `?replace=true` the imported rows replace the whole list; otherwise
/// codes that already exist are skipped.
/// Admin only.
pub async fn import_candidates(
    State(state): State<AppState>,
    Query(params): Query<ImportParams>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let existing: HashSet<String> = if params.replace {
        HashSet::new()
    } else {
        state
            .repos
            .candidates
            .list_candidates(&CandidateListParams {
                search: None,
                category: None,
            })
            .await?
            .into_iter()
            .map(|c| c.code)
            .collect()
    };

    let mut report = ImportReport::default();
    let mut seen = HashSet::new();
    let mut accepted = Vec::new();

    for record in csv::parse_document(&body) {
        let fields = record.fields;
        if fields.len() < CANDIDATE_HEADER.len() {
            report.reject(
                record.line,
                format!("expected {} fields, found {}", CANDIDATE_HEADER.len(), fields.len()),
            );
            continue;
        }

        let request = CreateCandidateRequest {
            code: fields[0].clone(),
            name: fields[1].clone(),
            church: fields[2].clone(),
            category: fields[3].clone(),
            password: fields[4].clone(),
            email: fields[5].clone(),
            status: CandidateStatus::Active,
        };

        if let Err(e) = request.validate() {
            report.reject(record.line, e);
            continue;
        }
        if existing.contains(&request.code) {
            report.reject(record.line, format!("exam code {} already exists", request.code));
            continue;
        }
        if !seen.insert(request.code.clone()) {
            report.reject(record.line, format!("exam code {} appears twice", request.code));
            continue;
        }

        accepted.push(Candidate {
            password: hash_optional(&request.password)?,
            code: request.code,
            name: request.name,
            church: request.church,
            category: request.category,
            email: request.email,
            status: request.status,
            code_used: false,
            created_at: Some(chrono::Utc::now()),
        });
    }

    if params.replace {
        state.repos.candidates.replace_candidates(&accepted).await?;
        report.imported = accepted.len();
    } else {
        for candidate in &accepted {
            match state.repos.candidates.insert_candidate(candidate).await {
                Ok(()) => report.imported += 1,
                Err(AppError::Conflict(msg)) => {
                    report.skipped += 1;
                    report.errors.push(msg);
                }
                Err(e) => return Err(e),
            }
        }
    }

    tracing::info!(
        "Candidate import: {} imported, {} skipped (replace = {})",
        report.imported,
        report.skipped,
        params.replace
    );
    Ok(Json(report))
}

/// Exports every candidate as CSV. Password hashes are not exported.
/// Admin only.
pub async fn export_candidates(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let candidates = state
        .repos
        .candidates
        .list_candidates(&CandidateListParams {
            search: None,
            category: None,
        })
        .await?;

    let rows: Vec<Vec<String>> = candidates
        .into_iter()
        .map(|c| {
            vec![
                c.code,
                c.name,
                c.church,
                c.category,
                c.email,
                c.status.as_str().to_string(),
                if c.code_used { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();

    let body = csv::write_document(
        &["Code", "Name", "Church", "Category", "Email", "Status", "Code Used"],
        &rows,
    );
    Ok(csv_download("candidates.csv", body))
}

/// A sample file for the candidate import.
/// Admin only.
pub async fn candidate_template() -> impl IntoResponse {
    let rows = vec![
        vec!["1001", "أحمد محمد", "العذراء", "كشافة", "12345678", "ahmed@example.com"],
        vec!["1002", "فاطمة علي", "مار جرجس", "أشبال", "87654321", "fatma@example.com"],
        vec!["1003", "مينا صبحي", "الأنبا أنطونيوس", "براعم", "77889900", "mina@example.com"],
    ];
    csv_download("candidates_template.csv", csv::write_document(&CANDIDATE_HEADER, &rows))
}

/// Totals for the dashboard.
/// Admin only.
pub async fn get_stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let (total_results, flagged_results, average_score) = state.repos.results.result_stats().await?;
    let (total_alerts, active_alerts) = state.repos.alerts.alert_counts().await?;

    Ok(Json(SystemStats {
        total_candidates: state.repos.candidates.count_candidates().await?,
        total_questions: state.repos.questions.count_questions().await?,
        total_results,
        flagged_results,
        total_alerts,
        active_alerts,
        live_sessions: state.sessions.live_count().await as i64,
        average_score,
    }))
}
