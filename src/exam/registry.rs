// src/exam/registry.rs

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::RwLock;

use crate::{
    error::AppError,
    exam::{
        error::ExamError,
        runtime::{self, SessionHandle},
        session::{ExamPolicy, ExamSession, ExamState},
    },
    models::candidate::CandidateIdentity,
    repository::{QuestionSource, ResultStore},
};

/// How long a submitted session stays around for its result page.
pub const LOCKED_RETENTION: Duration = Duration::from_secs(15 * 60);

/// Live exam sessions keyed by exam code. One session per code.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the candidate's live session, or starts a new one.
    ///
    /// Fails with `CodeAlreadyUsed` once a result exists for the code, and
    /// with `NoQuestions` when the category has nothing to ask. In the latter
    /// case no session is kept and no countdown runs.
    pub async fn start_or_resume(
        &self,
        identity: CandidateIdentity,
        questions: &dyn QuestionSource,
        store: Arc<dyn ResultStore>,
        policy: ExamPolicy,
    ) -> Result<SessionHandle, AppError> {
        let mut sessions = self.sessions.write().await;
        evict_stale(&mut sessions);

        if let Some(existing) = sessions.get(&identity.code) {
            if existing.state().await != ExamState::Locked {
                tracing::debug!("Resuming exam for {}", identity.code);
                return Ok(existing.clone());
            }
            return Err(ExamError::CodeAlreadyUsed(identity.code).into());
        }

        if store.has_result(&identity.code).await? {
            return Err(ExamError::CodeAlreadyUsed(identity.code).into());
        }

        let list = questions.for_category(&identity.category).await?;
        let code = identity.code.clone();
        let session = ExamSession::new(identity, list, policy)?;
        let handle = runtime::launch(session, store)?;

        sessions.insert(code, handle.clone());
        Ok(handle)
    }

    pub async fn get(&self, exam_code: &str) -> Result<SessionHandle, ExamError> {
        self.sessions
            .read()
            .await
            .get(exam_code)
            .cloned()
            .ok_or_else(|| ExamError::SessionNotFound(exam_code.to_string()))
    }

    /// Drops the session for `exam_code` and stops its background tasks.
    pub async fn remove(&self, exam_code: &str) -> bool {
        match self.sessions.write().await.remove(exam_code) {
            Some(handle) => {
                handle.shutdown();
                true
            }
            None => false,
        }
    }

    /// Drops every submitted session, so their codes can start again once
    /// the stored results are gone. Live sessions are kept.
    pub async fn prune_locked(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let mut locked = Vec::new();
        for (code, handle) in sessions.iter() {
            if handle.state().await == ExamState::Locked {
                locked.push(code.clone());
            }
        }
        for code in &locked {
            if let Some(handle) = sessions.remove(code) {
                handle.shutdown();
            }
        }
        locked.len()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Number of sessions that can still be answered.
    pub async fn live_count(&self) -> usize {
        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();
        let mut live = 0;
        for handle in handles {
            if handle.state().await.is_live() {
                live += 1;
            }
        }
        live
    }
}

/// Drops sessions locked for longer than `LOCKED_RETENTION`. The stored
/// result keeps their codes from starting again.
fn evict_stale(sessions: &mut HashMap<String, SessionHandle>) {
    sessions.retain(|code, handle| match handle.locked_for() {
        Some(age) if age >= LOCKED_RETENTION => {
            tracing::debug!("Evicting submitted session {}", code);
            handle.shutdown();
            false
        }
        _ => true,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        exam::session::SubmitTrigger,
        models::question::{AnswerValue, Question, QuestionKind},
        repository::{MemoryRepository, QuestionRepository},
    };

    fn identity(code: &str, category: &str) -> CandidateIdentity {
        CandidateIdentity {
            code: code.to_string(),
            name: "Mina".to_string(),
            church: String::new(),
            category: category.to_string(),
        }
    }

    async fn repo_with_question(category: Option<&str>) -> Arc<MemoryRepository> {
        let repo = Arc::new(MemoryRepository::new());
        repo.insert_question(&Question {
            id: 0,
            text: "Is the sky blue?".to_string(),
            kind: QuestionKind::TrueFalse,
            options: Vec::new(),
            correct_answer: AnswerValue::Flag(true),
            category: category.map(str::to_string),
            image_url: None,
            created_at: None,
        })
        .await
        .unwrap();
        repo
    }

    #[tokio::test(start_paused = true)]
    async fn resumes_live_session_and_refuses_after_submission() {
        let repo = repo_with_question(None).await;
        let registry = SessionRegistry::new();

        let first = registry
            .start_or_resume(identity("R-1", "جوالة"), repo.as_ref(), repo.clone(), ExamPolicy::default())
            .await
            .unwrap();
        first.set_answer(1, AnswerValue::Flag(true)).await.unwrap();

        let again = registry
            .start_or_resume(identity("R-1", "جوالة"), repo.as_ref(), repo.clone(), ExamPolicy::default())
            .await
            .unwrap();
        assert_eq!(again.snapshot().await.answered_count, 1);
        assert_eq!(registry.live_count().await, 1);

        again.submit(SubmitTrigger::Student).await.unwrap();
        let err = registry
            .start_or_resume(identity("R-1", "جوالة"), repo.as_ref(), repo.clone(), ExamPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(registry.live_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_category_keeps_no_session() {
        let repo = repo_with_question(Some("براعم")).await;
        let registry = SessionRegistry::new();

        let err = registry
            .start_or_resume(identity("R-2", "جوالة"), repo.as_ref(), repo.clone(), ExamPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unprocessable(_)));
        assert!(registry.get("R-2").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stored_result_blocks_a_fresh_start() {
        let repo = repo_with_question(None).await;
        let registry = SessionRegistry::new();
        let handle = registry
            .start_or_resume(identity("R-3", "جوالة"), repo.as_ref(), repo.clone(), ExamPolicy::default())
            .await
            .unwrap();
        handle.submit(SubmitTrigger::Student).await.unwrap();

        // A restarted process has no live session but the record remains.
        let fresh = SessionRegistry::new();
        let err = fresh
            .start_or_resume(identity("R-3", "جوالة"), repo.as_ref(), repo.clone(), ExamPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(registry.remove("R-3").await);
    }

    #[tokio::test(start_paused = true)]
    async fn submitted_sessions_are_evicted_after_retention() {
        let repo = repo_with_question(None).await;
        let registry = SessionRegistry::new();
        let done = registry
            .start_or_resume(identity("R-4", "جوالة"), repo.as_ref(), repo.clone(), ExamPolicy::default())
            .await
            .unwrap();
        done.submit(SubmitTrigger::Student).await.unwrap();

        tokio::time::sleep(LOCKED_RETENTION - Duration::from_secs(1)).await;
        registry
            .start_or_resume(identity("R-5", "جوالة"), repo.as_ref(), repo.clone(), ExamPolicy::default())
            .await
            .unwrap();
        assert!(registry.get("R-4").await.is_ok());

        tokio::time::sleep(Duration::from_secs(2)).await;
        registry
            .start_or_resume(identity("R-5", "جوالة"), repo.as_ref(), repo.clone(), ExamPolicy::default())
            .await
            .unwrap();
        assert!(registry.get("R-4").await.is_err());
        assert_eq!(registry.session_count().await, 1);

        let err = registry
            .start_or_resume(identity("R-4", "جوالة"), repo.as_ref(), repo.clone(), ExamPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
