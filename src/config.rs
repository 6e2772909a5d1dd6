// src/config.rs

use std::env;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::exam::{ExamPolicy, IntegrityPolicy};

/// Default exam length (60 minutes).
pub const DEFAULT_EXAM_DURATION_SECS: u64 = 3600;

/// Visibility losses after which the exam is auto-submitted.
pub const DEFAULT_TAB_SWITCH_THRESHOLD: u32 = 3;

/// Delay between the final warning and the automatic submission.
pub const DEFAULT_AUTO_SUBMIT_GRACE_SECS: u64 = 5;

/// Remaining time under which the clock is shown as running low.
pub const LOW_TIME_WARNING_SECS: u64 = 300;

/// Candidate categories accepted by the question bank and the candidate list.
pub const CATEGORIES: [&str; 6] = ["براعم", "أشبال", "كشافة", "مرشدات", "جوالة", "ذوو الهمم"];

pub static EXAM_CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{3,32}$").expect("exam code pattern is a valid regex")
});

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => write!(f, "{} has an invalid value '{}'", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub exam_duration_secs: u64,
    pub tab_switch_threshold: u32,
    pub auto_submit_grace_secs: u64,
}

impl Config {
    /// Reads the process environment. `main` loads `.env` beforehand.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration: parsed("JWT_EXPIRATION", 7200)?,
            rust_log,
            bind_addr,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            exam_duration_secs: parsed("EXAM_DURATION_SECS", DEFAULT_EXAM_DURATION_SECS)?,
            tab_switch_threshold: parsed("TAB_SWITCH_THRESHOLD", DEFAULT_TAB_SWITCH_THRESHOLD)?,
            auto_submit_grace_secs: parsed("AUTO_SUBMIT_GRACE_SECS", DEFAULT_AUTO_SUBMIT_GRACE_SECS)?,
        })
    }

    /// The per-attempt policy handed to every new exam session.
    pub fn exam_policy(&self) -> ExamPolicy {
        ExamPolicy {
            duration_secs: self.exam_duration_secs,
            integrity: IntegrityPolicy {
                threshold: self.tab_switch_threshold.max(1),
                grace: Duration::from_secs(self.auto_submit_grace_secs),
            },
        }
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn parsed<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}
