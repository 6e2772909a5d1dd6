// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, auth, exam, questions, results},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, candidate_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, exam, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_routes = Router::new().route("/login", post(auth::login));

    let exam_routes = Router::new()
        .route("/start", post(exam::start_exam))
        .route("/state", get(exam::get_state))
        .route("/answers/{question_id}", put(exam::save_answer))
        .route("/next", post(exam::next_question))
        .route("/previous", post(exam::previous_question))
        .route("/visibility-lost", post(exam::visibility_lost))
        .route("/submit", post(exam::submit_exam))
        // Auth first, then the role check
        .layer(middleware::from_fn(candidate_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route(
            "/candidates",
            get(admin::list_candidates).post(admin::create_candidate),
        )
        .route("/candidates/bulk-delete", post(admin::bulk_delete_candidates))
        .route("/candidates/import", post(admin::import_candidates))
        .route("/candidates/export", get(admin::export_candidates))
        .route("/candidates/template", get(admin::candidate_template))
        .route(
            "/candidates/{code}",
            put(admin::update_candidate).delete(admin::delete_candidate),
        )
        .route(
            "/questions",
            get(questions::list_questions).post(questions::create_question),
        )
        .route("/questions/import", post(questions::import_questions))
        .route("/questions/template", get(questions::question_template))
        .route(
            "/questions/{id}",
            put(questions::update_question).delete(questions::delete_question),
        )
        .route(
            "/results",
            get(results::list_results).delete(results::delete_all_results),
        )
        .route("/results/export", get(results::export_results))
        .route(
            "/results/{id}",
            get(results::get_result).delete(results::delete_result),
        )
        .route("/results/{id}/reset", post(results::reset_result))
        .route("/alerts", get(results::list_alerts))
        .route("/alerts/export", get(results::export_alerts))
        .route("/alerts/bulk-status", post(results::bulk_update_alerts))
        .route("/alerts/bulk-delete", post(results::bulk_delete_alerts))
        .route(
            "/alerts/{id}",
            put(results::update_alert).delete(results::delete_alert),
        )
        .route("/stats", get(admin::get_stats))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/exam", exam_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
