// src/repository/postgres.rs

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, types::Json};
use uuid::Uuid;

use crate::{
    error::AppError,
    exam::{AnswerMap, SubmitTrigger},
    models::{
        alert::{AlertListParams, AlertStatus, IntegrityAlert},
        candidate::{Candidate, CandidateListParams, CandidateStatus},
        exam_record::{AppendOutcome, ExamResult, ResultListParams, ResultStatus},
        question::{AnswerValue, Question, QuestionKind, QuestionListParams},
    },
    repository::{
        AlertRepository, CandidateRepository, QuestionRepository, QuestionSource, ResultRepository,
        ResultStore,
    },
};

/// Postgres-backed storage for every port.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CANDIDATE_COLUMNS: &str =
    "code, name, church, category, password, email, status, code_used, created_at";

const QUESTION_COLUMNS: &str =
    "id, type AS question_type, content, options, correct_answer, category, image_url, created_at";

const RESULT_COLUMNS: &str = "id, exam_code, user_name, church, category, score, correct_answers, \
     total_questions, answers, tab_switches, duration_secs, trigger, status, submitted_at";

const ALERT_COLUMNS: &str = "id, exam_code, user_name, church, category, kind, tab_switches, \
     severity, status, details, created_at";

#[derive(FromRow)]
struct CandidateRow {
    code: String,
    name: String,
    church: String,
    category: String,
    password: String,
    email: String,
    status: String,
    code_used: bool,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<CandidateRow> for Candidate {
    fn from(row: CandidateRow) -> Self {
        Candidate {
            code: row.code,
            name: row.name,
            church: row.church,
            category: row.category,
            password: row.password,
            email: row.email,
            status: CandidateStatus::parse(&row.status),
            code_used: row.code_used,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    question_type: String,
    content: String,
    options: Json<Vec<String>>,
    correct_answer: Json<AnswerValue>,
    category: Option<String>,
    image_url: Option<String>,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = AppError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let kind = QuestionKind::parse(&row.question_type).ok_or_else(|| {
            AppError::InternalServerError(format!(
                "question {} has unknown type '{}'",
                row.id, row.question_type
            ))
        })?;
        Ok(Question {
            id: row.id,
            text: row.content,
            kind,
            options: row.options.0,
            correct_answer: row.correct_answer.0,
            category: row.category,
            image_url: row.image_url,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ResultRow {
    id: Uuid,
    exam_code: String,
    user_name: String,
    church: String,
    category: String,
    score: i32,
    correct_answers: i32,
    total_questions: i32,
    answers: Json<AnswerMap>,
    tab_switches: i32,
    duration_secs: i64,
    trigger: String,
    status: String,
    submitted_at: chrono::DateTime<chrono::Utc>,
}

impl From<ResultRow> for ExamResult {
    fn from(row: ResultRow) -> Self {
        ExamResult {
            id: row.id,
            exam_code: row.exam_code,
            user_name: row.user_name,
            church: row.church,
            category: row.category,
            score: row.score.max(0) as u32,
            correct_answers: row.correct_answers.max(0) as u32,
            total_questions: row.total_questions.max(0) as u32,
            answers: row.answers.0,
            tab_switches: row.tab_switches.max(0) as u32,
            duration_secs: row.duration_secs.max(0) as u64,
            trigger: SubmitTrigger::parse(&row.trigger),
            status: ResultStatus::parse(&row.status),
            submitted_at: row.submitted_at,
        }
    }
}

#[derive(FromRow)]
struct AlertRow {
    id: Uuid,
    exam_code: String,
    user_name: String,
    church: String,
    category: String,
    kind: String,
    tab_switches: i32,
    severity: String,
    status: String,
    details: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<AlertRow> for IntegrityAlert {
    type Error = AppError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        Ok(IntegrityAlert {
            id: row.id,
            exam_code: row.exam_code,
            user_name: row.user_name,
            church: row.church,
            category: row.category,
            kind: enum_from_text(row.kind)?,
            tab_switches: row.tab_switches.max(0) as u32,
            severity: enum_from_text(row.severity)?,
            status: enum_from_text(row.status)?,
            details: row.details,
            created_at: row.created_at,
        })
    }
}

/// Stores a unit-variant enum using its serde name.
fn enum_to_text<T: Serialize>(value: &T) -> Result<String, AppError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => Ok(s),
        Ok(other) => Err(AppError::InternalServerError(format!(
            "expected a string enum, got {}",
            other
        ))),
        Err(e) => Err(AppError::InternalServerError(e.to_string())),
    }
}

fn enum_from_text<T: DeserializeOwned>(text: String) -> Result<T, AppError> {
    serde_json::from_value(serde_json::Value::String(text))
        .map_err(|e| AppError::InternalServerError(e.to_string()))
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn selected_category(category: Option<&str>) -> Option<&str> {
    match category {
        None | Some("") | Some("all") => None,
        Some(c) => Some(c),
    }
}

#[async_trait]
impl QuestionSource for PgRepository {
    async fn for_category(&self, category: &str) -> Result<Vec<Question>, AppError> {
        let sql = format!(
            "SELECT {} FROM questions \
             WHERE category IS NULL OR category = '' OR category = $1 \
             ORDER BY id",
            QUESTION_COLUMNS
        );
        let rows: Vec<QuestionRow> = sqlx::query_as(&sql)
            .bind(category)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load questions for category {}: {:?}", category, e);
                AppError::from(e)
            })?;

        rows.into_iter().map(Question::try_from).collect()
    }
}

#[async_trait]
impl ResultStore for PgRepository {
    async fn append(&self, result: &ExamResult) -> Result<AppendOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO exam_results
            (id, exam_code, user_name, church, category, score, correct_answers, total_questions,
             answers, tab_switches, duration_secs, trigger, status, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (exam_code) DO NOTHING
            "#,
        )
        .bind(result.id)
        .bind(&result.exam_code)
        .bind(&result.user_name)
        .bind(&result.church)
        .bind(&result.category)
        .bind(result.score as i32)
        .bind(result.correct_answers as i32)
        .bind(result.total_questions as i32)
        .bind(Json(&result.answers))
        .bind(result.tab_switches as i32)
        .bind(result.duration_secs as i64)
        .bind(result.trigger.as_str())
        .bind(result.status.as_str())
        .bind(result.submitted_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert exam result for {}: {:?}", result.exam_code, e);
            AppError::from(e)
        })?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Ok(AppendOutcome::Duplicate);
        }

        sqlx::query("UPDATE candidates SET code_used = TRUE WHERE code = $1")
            .bind(&result.exam_code)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(AppendOutcome::Appended)
    }

    async fn has_result(&self, exam_code: &str) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM exam_results WHERE exam_code = $1)")
                .bind(exam_code)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn stored_result(&self, exam_code: &str) -> Result<Option<ExamResult>, AppError> {
        let sql = format!("SELECT {} FROM exam_results WHERE exam_code = $1", RESULT_COLUMNS);
        let row: Option<ResultRow> = sqlx::query_as(&sql)
            .bind(exam_code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ExamResult::from))
    }
}

#[async_trait]
impl CandidateRepository for PgRepository {
    async fn list_candidates(&self, params: &CandidateListParams) -> Result<Vec<Candidate>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM candidates WHERE TRUE", CANDIDATE_COLUMNS));

        if let Some(category) = selected_category(params.category.as_deref()) {
            builder.push(" AND category = ");
            builder.push_bind(category.to_string());
        }

        if let Some(term) = params.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = like_pattern(term);
            builder.push(" AND (name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR code LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR church ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        builder.push(" ORDER BY created_at DESC, code");

        let rows: Vec<CandidateRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list candidates: {:?}", e);
                AppError::from(e)
            })?;

        Ok(rows.into_iter().map(Candidate::from).collect())
    }

    async fn find_candidate(&self, code: &str) -> Result<Option<Candidate>, AppError> {
        let sql = format!("SELECT {} FROM candidates WHERE code = $1", CANDIDATE_COLUMNS);
        let row: Option<CandidateRow> = sqlx::query_as(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Candidate::from))
    }

    async fn insert_candidate(&self, candidate: &Candidate) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO candidates (code, name, church, category, password, email, status, code_used)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&candidate.code)
        .bind(&candidate.name)
        .bind(&candidate.church)
        .bind(&candidate.category)
        .bind(&candidate.password)
        .bind(&candidate.email)
        .bind(candidate.status.as_str())
        .bind(candidate.code_used)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("Exam code '{}' already exists", candidate.code))
            }
            _ => {
                tracing::error!("Failed to create candidate: {:?}", e);
                AppError::from(e)
            }
        })?;
        Ok(())
    }

    async fn update_candidate(&self, candidate: &Candidate) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE candidates
            SET name = $2, church = $3, category = $4, password = $5, email = $6, status = $7,
                code_used = $8
            WHERE code = $1
            "#,
        )
        .bind(&candidate.code)
        .bind(&candidate.name)
        .bind(&candidate.church)
        .bind(&candidate.category)
        .bind(&candidate.password)
        .bind(&candidate.email)
        .bind(candidate.status.as_str())
        .bind(candidate.code_used)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Candidate not found".to_string()));
        }
        Ok(())
    }

    async fn delete_candidates(&self, codes: &[String]) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM candidates WHERE code = ANY($1)")
            .bind(codes)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete candidates: {:?}", e);
                AppError::from(e)
            })?;
        Ok(result.rows_affected())
    }

    async fn replace_candidates(&self, candidates: &[Candidate]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM candidates").execute(&mut *tx).await?;

        for candidate in candidates {
            sqlx::query(
                r#"
                INSERT INTO candidates (code, name, church, category, password, email, status, code_used)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(&candidate.code)
            .bind(&candidate.name)
            .bind(&candidate.church)
            .bind(&candidate.category)
            .bind(&candidate.password)
            .bind(&candidate.email)
            .bind(candidate.status.as_str())
            .bind(candidate.code_used)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn set_code_used(&self, code: &str, used: bool) -> Result<(), AppError> {
        sqlx::query("UPDATE candidates SET code_used = $2 WHERE code = $1")
            .bind(code)
            .bind(used)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_candidates(&self) -> Result<i64, AppError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM candidates")
            .fetch_one(&self.pool)
            .await?)
    }
}

#[async_trait]
impl QuestionRepository for PgRepository {
    async fn list_questions(&self, params: &QuestionListParams) -> Result<Vec<Question>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM questions WHERE TRUE", QUESTION_COLUMNS));

        if let Some(category) = selected_category(params.category.as_deref()) {
            builder.push(" AND category = ");
            builder.push_bind(category.to_string());
        }
        if let Some(term) = params.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            builder.push(" AND content ILIKE ");
            builder.push_bind(like_pattern(term));
        }
        builder.push(" ORDER BY id");

        let rows: Vec<QuestionRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list questions: {:?}", e);
                AppError::from(e)
            })?;

        rows.into_iter().map(Question::try_from).collect()
    }

    async fn find_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        let sql = format!("SELECT {} FROM questions WHERE id = $1", QUESTION_COLUMNS);
        let row: Option<QuestionRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Question::try_from).transpose()
    }

    async fn insert_question(&self, question: &Question) -> Result<Question, AppError> {
        let sql = format!(
            r#"
            INSERT INTO questions (type, content, options, correct_answer, category, image_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            QUESTION_COLUMNS
        );
        let row: QuestionRow = sqlx::query_as(&sql)
            .bind(question.kind.as_str())
            .bind(&question.text)
            .bind(Json(&question.options))
            .bind(Json(&question.correct_answer))
            .bind(&question.category)
            .bind(&question.image_url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create question: {:?}", e);
                AppError::from(e)
            })?;
        Question::try_from(row)
    }

    async fn update_question(&self, question: &Question) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE questions
            SET type = $2, content = $3, options = $4, correct_answer = $5, category = $6,
                image_url = $7
            WHERE id = $1
            "#,
        )
        .bind(question.id)
        .bind(question.kind.as_str())
        .bind(&question.text)
        .bind(Json(&question.options))
        .bind(Json(&question.correct_answer))
        .bind(&question.category)
        .bind(&question.image_url)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update question: {:?}", e);
            AppError::from(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Question not found".to_string()));
        }
        Ok(())
    }

    async fn delete_question(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete question: {:?}", e);
                AppError::from(e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_questions(&self) -> Result<i64, AppError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM questions")
            .fetch_one(&self.pool)
            .await?)
    }
}

#[async_trait]
impl ResultRepository for PgRepository {
    async fn list_results(&self, params: &ResultListParams) -> Result<Vec<ExamResult>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM exam_results WHERE TRUE", RESULT_COLUMNS));

        if let Some(category) = selected_category(params.category.as_deref()) {
            builder.push(" AND category = ");
            builder.push_bind(category.to_string());
        }
        if let Some(min) = params.min_score {
            builder.push(" AND score >= ");
            builder.push_bind(min as i32);
        }
        if params.has_alerts == Some(true) {
            builder.push(" AND tab_switches > 0");
        }
        if let Some(term) = params.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = like_pattern(term);
            builder.push(" AND (user_name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR exam_code LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR church ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }
        builder.push(" ORDER BY submitted_at DESC");

        let rows: Vec<ResultRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list results: {:?}", e);
                AppError::from(e)
            })?;

        Ok(rows.into_iter().map(ExamResult::from).collect())
    }

    async fn find_result(&self, id: Uuid) -> Result<Option<ExamResult>, AppError> {
        let sql = format!("SELECT {} FROM exam_results WHERE id = $1", RESULT_COLUMNS);
        let row: Option<ResultRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ExamResult::from))
    }

    async fn delete_result(&self, id: Uuid) -> Result<Option<ExamResult>, AppError> {
        let sql = format!("DELETE FROM exam_results WHERE id = $1 RETURNING {}", RESULT_COLUMNS);
        let row: Option<ResultRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete result: {:?}", e);
                AppError::from(e)
            })?;
        Ok(row.map(ExamResult::from))
    }

    async fn delete_all_results(&self) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM exam_results")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("UPDATE candidates SET code_used = FALSE")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn result_stats(&self) -> Result<(i64, i64, Option<f64>), AppError> {
        Ok(sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'flagged'),
                AVG(score)::FLOAT8
            FROM exam_results
            "#,
        )
        .fetch_one(&self.pool)
        .await?)
    }
}

#[async_trait]
impl AlertRepository for PgRepository {
    async fn append_alert(&self, alert: &IntegrityAlert) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO integrity_alerts
            (id, exam_code, user_name, church, category, kind, tab_switches, severity, status,
             details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(alert.id)
        .bind(&alert.exam_code)
        .bind(&alert.user_name)
        .bind(&alert.church)
        .bind(&alert.category)
        .bind(enum_to_text(&alert.kind)?)
        .bind(alert.tab_switches as i32)
        .bind(enum_to_text(&alert.severity)?)
        .bind(enum_to_text(&alert.status)?)
        .bind(&alert.details)
        .bind(alert.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to record integrity alert: {:?}", e);
            AppError::from(e)
        })?;
        Ok(())
    }

    async fn list_alerts(&self, params: &AlertListParams) -> Result<Vec<IntegrityAlert>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM integrity_alerts WHERE TRUE", ALERT_COLUMNS));

        if let Some(status) = params.status {
            builder.push(" AND status = ");
            builder.push_bind(enum_to_text(&status)?);
        }
        if let Some(code) = params.exam_code.as_deref() {
            builder.push(" AND exam_code = ");
            builder.push_bind(code.to_string());
        }
        builder.push(" ORDER BY created_at DESC");

        let rows: Vec<AlertRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(IntegrityAlert::try_from).collect()
    }

    async fn set_alert_status(&self, ids: &[Uuid], status: AlertStatus) -> Result<u64, AppError> {
        let result = sqlx::query("UPDATE integrity_alerts SET status = $2 WHERE id = ANY($1)")
            .bind(ids)
            .bind(enum_to_text(&status)?)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_alerts(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM integrity_alerts WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete alerts: {:?}", e);
                AppError::from(e)
            })?;
        Ok(result.rows_affected())
    }

    async fn alert_counts(&self) -> Result<(i64, i64), AppError> {
        Ok(sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'active') FROM integrity_alerts",
        )
        .fetch_one(&self.pool)
        .await?)
    }
}
