// tests/common/mod.rs

use std::sync::Arc;

use scout_exam::{
    config::Config,
    models::{
        candidate::{Candidate, CandidateStatus},
        question::{AnswerValue, Question, QuestionKind},
    },
    repository::{CandidateRepository, MemoryRepository, QuestionRepository, Repositories},
    routes,
    state::AppState,
    utils::hash::hash_password,
};
use serde_json::Value;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-pass";
pub const CATEGORY: &str = "كشافة";

pub struct TestApp {
    pub address: String,
    pub repo: Arc<MemoryRepository>,
    pub client: reqwest::Client,
}

pub fn test_config(threshold: u32, grace_secs: u64) -> Config {
    Config {
        database_url: String::new(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        admin_username: Some(ADMIN_USERNAME.to_string()),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
        exam_duration_secs: 3600,
        tab_switch_threshold: threshold,
        auto_submit_grace_secs: grace_secs,
    }
}

/// Spawns the app on a random port, backed by in-memory storage.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config(3, 5)).await
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    let repo = Arc::new(MemoryRepository::new());
    let state = AppState::new(Repositories::from_backend(repo.clone()), config)
        .expect("Failed to build app state");
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        repo,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn add_candidate(&self, code: &str, password: &str) {
        self.repo
            .insert_candidate(&Candidate {
                code: code.to_string(),
                name: "Mina Adel".to_string(),
                church: "St. Mark".to_string(),
                category: CATEGORY.to_string(),
                password: hash_password(password).unwrap(),
                email: String::new(),
                status: CandidateStatus::Active,
                code_used: false,
                created_at: None,
            })
            .await
            .unwrap();
    }

    /// Adds `n` true/false questions for the test category; the key is `true`.
    pub async fn add_questions(&self, n: usize) {
        for i in 0..n {
            self.repo
                .insert_question(&Question {
                    id: 0,
                    text: format!("Statement {}", i + 1),
                    kind: QuestionKind::TrueFalse,
                    options: Vec::new(),
                    correct_answer: AnswerValue::Flag(true),
                    category: Some(CATEGORY.to_string()),
                    image_url: None,
                    created_at: None,
                })
                .await
                .unwrap();
        }
    }

    pub async fn login(&self, code: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&serde_json::json!({ "code": code, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn token(&self, code: &str, password: &str) -> String {
        let response = self.login(code, password).await;
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.token(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    pub async fn post(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }
}
