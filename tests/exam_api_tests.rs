// tests/exam_api_tests.rs

mod common;

use std::time::Duration;

use common::{spawn_app, spawn_app_with, test_config};
use scout_exam::{
    models::candidate::{Candidate, CandidateStatus},
    repository::CandidateRepository,
};
use serde_json::{Value, json};

#[tokio::test]
async fn unknown_path_returns_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn login_rejects_unknown_code_and_wrong_password() {
    let app = spawn_app().await;
    app.add_candidate("S-1001", "secret1").await;

    assert_eq!(app.login("S-9999", "secret1").await.status().as_u16(), 401);
    assert_eq!(app.login("S-1001", "wrong-pass").await.status().as_u16(), 401);

    let response = app.login("S-1001", "secret1").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["role"], "candidate");
    assert_eq!(body["type"], "Bearer");
    assert_eq!(body["category"], common::CATEGORY);
}

#[tokio::test]
async fn exam_routes_require_a_candidate_token() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/exam/start"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let admin = app.admin_token().await;
    assert_eq!(app.post("/api/exam/start", &admin).await.status().as_u16(), 403);
}

#[tokio::test]
async fn full_exam_flow_scores_once_and_consumes_the_code() {
    let app = spawn_app().await;
    app.add_candidate("S-1002", "secret1").await;
    app.add_questions(3).await;
    let token = app.token("S-1002", "secret1").await;

    let state: Value = app.post("/api/exam/start", &token).await.json().await.unwrap();
    assert_eq!(state["state"], "in_progress");
    assert_eq!(state["total_questions"], 3);
    assert_eq!(state["current_index"], 0);
    assert_eq!(state["clock"], "01:00:00");
    let first_id = state["current_question"]["id"].as_i64().unwrap();
    assert!(state["current_question"].get("correct_answer").is_none());

    // Answer the first question, then change the selection.
    for answer in [false, true] {
        let response = app
            .client
            .put(app.url(&format!("/api/exam/answers/{}", first_id)))
            .bearer_auth(&token)
            .json(&json!({ "answer": answer }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    // Wrong answer shape for a true/false question.
    let response = app
        .client
        .put(app.url(&format!("/api/exam/answers/{}", first_id)))
        .bearer_auth(&token)
        .json(&json!({ "answer": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Submitting is only offered on the last question.
    assert_eq!(app.post("/api/exam/submit", &token).await.status().as_u16(), 400);

    app.post("/api/exam/next", &token).await;
    let state: Value = app.post("/api/exam/next", &token).await.json().await.unwrap();
    assert_eq!(state["current_index"], 2);
    assert_eq!(state["is_last"], true);
    assert_eq!(state["answered_count"], 1);

    let response = app.post("/api/exam/submit", &token).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["correct_answers"], 1);
    assert_eq!(body["result"]["total_questions"], 3);
    assert_eq!(body["result"]["score"], 33);
    assert_eq!(body["result"]["status"], "completed");

    assert_eq!(app.post("/api/exam/submit", &token).await.status().as_u16(), 409);

    let state: Value = app.get("/api/exam/state", &token).await.json().await.unwrap();
    assert_eq!(state["state"], "locked");
    assert!(state["current_question"].is_null());

    // The code cannot be used to log in again.
    assert_eq!(app.login("S-1002", "secret1").await.status().as_u16(), 409);
}

#[tokio::test]
async fn start_without_questions_is_unprocessable() {
    let app = spawn_app().await;
    app.add_candidate("S-1003", "secret1").await;
    let token = app.token("S-1003", "secret1").await;

    let response = app.post("/api/exam/start", &token).await;
    assert_eq!(response.status().as_u16(), 422);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("No questions available"));

    assert_eq!(app.get("/api/exam/state", &token).await.status().as_u16(), 404);
}

#[tokio::test]
async fn reloading_resumes_the_same_attempt() {
    let app = spawn_app().await;
    app.add_candidate("S-1004", "secret1").await;
    app.add_questions(2).await;
    let token = app.token("S-1004", "secret1").await;

    app.post("/api/exam/start", &token).await;
    app.post("/api/exam/next", &token).await;

    let state: Value = app.post("/api/exam/start", &token).await.json().await.unwrap();
    assert_eq!(state["current_index"], 1);
}

#[tokio::test]
async fn leaving_the_page_too_often_submits_automatically() {
    let app = spawn_app_with(test_config(3, 1)).await;
    app.add_candidate("S-1005", "secret1").await;
    app.add_questions(2).await;
    let token = app.token("S-1005", "secret1").await;
    app.post("/api/exam/start", &token).await;

    let body: Value = app
        .post("/api/exam/visibility-lost", &token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["verdict"]["verdict"], "warning");
    assert_eq!(body["state"]["state"], "warning");

    app.post("/api/exam/visibility-lost", &token).await;
    let body: Value = app
        .post("/api/exam/visibility-lost", &token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["verdict"]["verdict"], "schedule_auto_submit");
    assert_eq!(body["verdict"]["grace_secs"], 1);

    let body: Value = app
        .post("/api/exam/visibility-lost", &token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["verdict"]["verdict"], "final_warning");

    tokio::time::sleep(Duration::from_millis(1800)).await;

    let state: Value = app.get("/api/exam/state", &token).await.json().await.unwrap();
    assert_eq!(state["state"], "locked");
    assert_eq!(state["result"]["tab_switches"], 4);
    assert_eq!(state["result"]["trigger"], "integrity_auto_submit");
    assert_eq!(state["result"]["status"], "flagged");

    let admin = app.admin_token().await;
    let results: Value = app.get("/api/admin/results", &admin).await.json().await.unwrap();
    assert_eq!(results.as_array().unwrap().len(), 1);

    let alerts: Value = app.get("/api/admin/alerts", &admin).await.json().await.unwrap();
    let alerts = alerts.as_array().unwrap();
    assert_eq!(alerts.len(), 4);
    assert!(alerts.iter().any(|a| a["kind"] == "auto_submit" && a["severity"] == "high"));
}

#[tokio::test]
async fn plain_text_password_is_hashed_after_login() {
    let app = spawn_app().await;
    app.repo
        .insert_candidate(&Candidate {
            code: "S-1010".to_string(),
            name: "Mina Adel".to_string(),
            church: "St. Mark".to_string(),
            category: common::CATEGORY.to_string(),
            password: "12345678".to_string(),
            email: String::new(),
            status: CandidateStatus::Active,
            code_used: false,
            created_at: None,
        })
        .await
        .unwrap();

    assert_eq!(app.login("S-1010", "1234567").await.status().as_u16(), 401);
    assert_eq!(app.login("S-1010", "12345678").await.status().as_u16(), 200);

    let stored = app.repo.find_candidate("S-1010").await.unwrap().unwrap();
    assert!(stored.password.starts_with("$argon2"));
    assert_eq!(app.login("S-1010", "12345678").await.status().as_u16(), 200);
}
