// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError, models::candidate::CandidateIdentity};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_CANDIDATE: &str = "candidate";

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject: the exam code for candidates, the username for the admin.
    pub sub: String,
    /// 'candidate' or 'admin'.
    pub role: String,
    pub name: String,
    #[serde(default)]
    pub church: String,
    /// Empty for the admin.
    #[serde(default)]
    pub category: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn for_candidate(identity: &CandidateIdentity, expiration_seconds: u64) -> Result<Self, AppError> {
        Ok(Self {
            sub: identity.code.clone(),
            role: ROLE_CANDIDATE.to_string(),
            name: identity.name.clone(),
            church: identity.church.clone(),
            category: identity.category.clone(),
            exp: expires_at(expiration_seconds)?,
        })
    }

    pub fn for_admin(username: &str, expiration_seconds: u64) -> Result<Self, AppError> {
        Ok(Self {
            sub: username.to_string(),
            role: ROLE_ADMIN.to_string(),
            name: username.to_string(),
            church: String::new(),
            category: String::new(),
            exp: expires_at(expiration_seconds)?,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    /// The identity an exam session runs under.
    pub fn identity(&self) -> CandidateIdentity {
        CandidateIdentity {
            code: self.sub.clone(),
            name: self.name.clone(),
            church: self.church.clone(),
            category: self.category.clone(),
        }
    }
}

fn expires_at(expiration_seconds: u64) -> Result<usize, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs();
    Ok((now + expiration_seconds) as usize)
}

/// Signs `claims` with the shared secret.
pub fn sign_jwt(claims: &Claims, secret: &str) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Axum Middleware: Authentication.
///
/// Validates the 'Authorization: Bearer <token>' header and injects `Claims`
/// into the request extensions. Returns 401 otherwise.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    match verify_jwt(token, &config.jwt_secret) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !claims.is_admin() {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}

/// Axum Middleware: only candidates may sit an exam.
///
/// Must be used AFTER `auth_middleware`.
pub async fn candidate_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if claims.role != ROLE_CANDIDATE {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}
