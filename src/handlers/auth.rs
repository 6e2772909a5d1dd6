// src/handlers/auth.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use validator::Validate;

use crate::{
    error::AppError,
    models::candidate::{CandidateStatus, LoginRequest},
    state::AppState,
    utils::{
        hash::{hash_password, needs_rehash, verify_password},
        jwt::{Claims, sign_jwt},
    },
};

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: &'static str,
    pub role: String,
    pub name: String,
    pub category: String,
}

impl LoginResponse {
    fn new(claims: &Claims, token: String) -> Self {
        Self {
            token,
            token_type: "Bearer",
            role: claims.role.clone(),
            name: claims.name.clone(),
            category: claims.category.clone(),
        }
    }
}

/// Authenticates the admin or an exam candidate and returns a JWT token.
///
/// The admin logs in with the configured username in place of an exam code.
/// A candidate's code must exist, be active and not yet be used.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let code = payload.code.trim();

    if let Some(admin) = state.admin.as_deref().filter(|a| a.username == code) {
        if !verify_password(&payload.password, &admin.password_hash)? {
            tracing::warn!("Failed admin login for {}", code);
            return Err(AppError::AuthError("Invalid credentials".to_string()));
        }
        let claims = Claims::for_admin(&admin.username, state.config.jwt_expiration)?;
        let token = sign_jwt(&claims, &state.config.jwt_secret)?;
        tracing::info!("Admin {} logged in", admin.username);
        return Ok(Json(LoginResponse::new(&claims, token)));
    }

    let candidate = state
        .repos
        .candidates
        .find_candidate(code)
        .await?
        .ok_or_else(|| AppError::AuthError("Invalid exam code or password".to_string()))?;

    if !verify_password(&payload.password, &candidate.password)? {
        tracing::warn!("Failed login for exam code {}", code);
        return Err(AppError::AuthError("Invalid exam code or password".to_string()));
    }

    if candidate.status == CandidateStatus::Inactive {
        return Err(AppError::Forbidden("This exam code is inactive".to_string()));
    }

    if candidate.code_used {
        return Err(AppError::Conflict(
            "This exam code has already been used".to_string(),
        ));
    }

    if needs_rehash(&candidate.password) {
        let mut upgraded = candidate.clone();
        upgraded.password = hash_password(&payload.password)?;
        if let Err(e) = state.repos.candidates.update_candidate(&upgraded).await {
            tracing::error!("Failed to hash stored password for {}: {:?}", candidate.code, e);
        }
    }

    let claims = Claims::for_candidate(&candidate.identity(), state.config.jwt_expiration)?;
    let token = sign_jwt(&claims, &state.config.jwt_secret)?;
    tracing::info!("Candidate {} logged in", candidate.code);

    Ok(Json(LoginResponse::new(&claims, token)))
}
