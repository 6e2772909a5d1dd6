// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config, error::AppError, exam::SessionRegistry, repository::Repositories,
    utils::hash::hash_password,
};

/// The administrator account configured through the environment.
#[derive(Debug)]
pub struct AdminAccount {
    pub username: String,
    pub password_hash: String,
}

impl AdminAccount {
    /// Hashes the configured admin password. Returns `None` when no admin is
    /// configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>, AppError> {
        match (&config.admin_username, &config.admin_password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Ok(Some(Self {
                    username: username.clone(),
                    password_hash: hash_password(password)?,
                }))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub config: Config,
    pub sessions: SessionRegistry,
    pub admin: Option<Arc<AdminAccount>>,
}

impl AppState {
    pub fn new(repos: Repositories, config: Config) -> Result<Self, AppError> {
        let admin = AdminAccount::from_config(&config)?.map(Arc::new);
        Ok(Self {
            repos,
            config,
            sessions: SessionRegistry::new(),
            admin,
        })
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
