// src/exam/runtime.rs

//! Drives an `ExamSession` in the background: the one-second countdown and
//! the delayed automatic submission. Every path that ends an attempt goes
//! through `SessionHandle::submit`.

use std::{
    fmt,
    sync::{Arc, Mutex as StdMutex, MutexGuard},
    time::Duration,
};

use serde::Serialize;
use tokio::{sync::Mutex, task::JoinHandle, time::Instant};

use crate::{
    error::AppError,
    exam::{
        error::ExamError,
        monitor::MonitorVerdict,
        session::{ExamSession, ExamState, SubmitTrigger},
        timer::{TickOutcome, format_clock},
    },
    models::{
        candidate::CandidateIdentity,
        exam_record::{AppendOutcome, ExamResult},
        question::{AnswerValue, PublicQuestion},
    },
    repository::ResultStore,
};

const TICK: Duration = Duration::from_secs(1);
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Default)]
struct SessionTasks {
    ticker: Option<JoinHandle<()>>,
    grace: Option<JoinHandle<()>>,
    locked_at: Option<Instant>,
}

struct SessionShared {
    identity: CandidateIdentity,
    session: Mutex<ExamSession>,
    store: Arc<dyn ResultStore>,
    tasks: StdMutex<SessionTasks>,
}

impl SessionShared {
    fn tasks(&self) -> MutexGuard<'_, SessionTasks> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared handle to a running exam attempt.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("exam_code", &self.shared.identity.code)
            .finish_non_exhaustive()
    }
}

/// Everything the exam page renders, taken under one lock.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub exam_code: String,
    pub name: String,
    pub category: String,
    pub state: ExamState,
    pub current_index: usize,
    pub total_questions: usize,
    pub current_question: Option<PublicQuestion>,
    pub current_answer: Option<AnswerValue>,
    pub answered_questions: Vec<i64>,
    pub answered_count: usize,
    pub progress_percent: u32,
    pub is_last: bool,
    pub remaining_seconds: u64,
    pub clock: String,
    pub running_low: bool,
    pub tab_switches: u32,
    pub tab_switch_threshold: u32,
    pub warning: Option<String>,
    pub result: Option<ExamResult>,
}

/// Starts `session` and its countdown.
pub fn launch(mut session: ExamSession, store: Arc<dyn ResultStore>) -> Result<SessionHandle, ExamError> {
    session.start()?;

    let handle = SessionHandle {
        shared: Arc::new(SessionShared {
            identity: session.identity().clone(),
            session: Mutex::new(session),
            store,
            tasks: StdMutex::new(SessionTasks::default()),
        }),
    };

    let ticker = tokio::spawn(run_ticker(handle.clone()));
    handle.shared.tasks().ticker = Some(ticker);

    tracing::info!("Exam started for {}", handle.shared.identity.code);
    Ok(handle)
}

async fn run_ticker(handle: SessionHandle) {
    let mut interval = tokio::time::interval(TICK);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;

        let (outcome, state) = {
            let mut session = handle.shared.session.lock().await;
            (session.tick(), session.state())
        };

        if state == ExamState::Locked {
            break;
        }

        if outcome == TickOutcome::Expired {
            tracing::info!("Time is up for {}", handle.shared.identity.code);
            match handle.submit(SubmitTrigger::TimerExpired).await {
                Ok(_) => break,
                Err(AppError::Conflict(msg)) => {
                    tracing::debug!("Timer submission skipped: {}", msg);
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        "Timer submission failed for {}: {:?}",
                        handle.shared.identity.code,
                        e
                    );
                }
            }
        }
    }
}

/// Waits out the grace period, then submits. A scheduled automatic
/// submission cannot be called off, so store failures are retried with a
/// growing delay until a result exists.
async fn run_grace(handle: SessionHandle, grace: Duration) {
    tokio::time::sleep(grace).await;

    let mut backoff = TICK;
    loop {
        match handle.submit(SubmitTrigger::IntegrityAutoSubmit).await {
            Ok(result) => {
                tracing::warn!(
                    "Exam auto-submitted for {} after {} tab switches",
                    result.exam_code,
                    result.tab_switches
                );
                break;
            }
            Err(AppError::InternalServerError(msg)) => {
                tracing::error!(
                    "Auto-submission failed for {}, retrying in {}s: {}",
                    handle.shared.identity.code,
                    backoff.as_secs(),
                    msg
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_RETRY_BACKOFF);
            }
            Err(e) => {
                tracing::debug!("Auto-submission skipped: {:?}", e);
                break;
            }
        }
    }
}

impl SessionHandle {
    pub fn identity(&self) -> &CandidateIdentity {
        &self.shared.identity
    }

    pub fn exam_code(&self) -> &str {
        &self.shared.identity.code
    }

    pub async fn state(&self) -> ExamState {
        self.shared.session.lock().await.state()
    }

    pub async fn set_answer(&self, question_id: i64, value: AnswerValue) -> Result<(), ExamError> {
        self.shared.session.lock().await.set_answer(question_id, value)
    }

    pub async fn next(&self) -> Result<bool, ExamError> {
        self.shared.session.lock().await.next()
    }

    pub async fn previous(&self) -> Result<bool, ExamError> {
        self.shared.session.lock().await.previous()
    }

    /// Records a visibility loss. Reaching the threshold schedules exactly
    /// one automatic submission after the grace period.
    pub async fn visibility_lost(&self) -> Result<MonitorVerdict, ExamError> {
        let verdict = self.shared.session.lock().await.visibility_lost()?;

        if let MonitorVerdict::ScheduleAutoSubmit { count, grace } = verdict {
            let mut tasks = self.shared.tasks();
            if tasks.grace.is_none() {
                tracing::warn!(
                    "Tab switch threshold reached for {} ({} switches); submitting in {}s",
                    self.shared.identity.code,
                    count,
                    grace.as_secs()
                );
                tasks.grace = Some(tokio::spawn(run_grace(self.clone(), grace)));
            }
        }

        Ok(verdict)
    }

    /// The single submission routine shared by the candidate, the countdown
    /// and the integrity monitor. The session stays locked across the
    /// store call, so concurrent triggers see `AlreadySubmitted`.
    pub async fn submit(&self, trigger: SubmitTrigger) -> Result<ExamResult, AppError> {
        let mut session = self.shared.session.lock().await;
        let ticket = session.begin_submit(trigger)?;
        let graded = session.grade(&ticket, chrono::Utc::now());

        let record = match self.persist(graded).await {
            Ok(record) => record,
            Err(e) => {
                session.abort_submit(ticket);
                tracing::error!(
                    "Could not store result for {}: {:?}",
                    self.shared.identity.code,
                    e
                );
                return Err(e);
            }
        };

        let stored = session.finish(ticket, record).clone();
        drop(session);
        self.stop_tasks(trigger);

        tracing::info!(
            "Exam submitted for {} ({}): {}/{} correct, {}%",
            stored.exam_code,
            trigger.as_str(),
            stored.correct_answers,
            stored.total_questions,
            stored.score
        );
        Ok(stored)
    }

    /// Appends `graded`. When the code already has a record, that record is
    /// returned instead so the session shows what was persisted.
    async fn persist(&self, graded: ExamResult) -> Result<ExamResult, AppError> {
        match self.shared.store.append(&graded).await? {
            AppendOutcome::Appended => Ok(graded),
            AppendOutcome::Duplicate => {
                tracing::warn!(
                    "A result for {} was already stored; keeping the stored record",
                    graded.exam_code
                );
                Ok(self
                    .shared
                    .store
                    .stored_result(&graded.exam_code)
                    .await?
                    .unwrap_or(graded))
            }
        }
    }

    /// How long the session has been locked, if it has been submitted.
    pub fn locked_for(&self) -> Option<Duration> {
        self.shared.tasks().locked_at.map(|at| at.elapsed())
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.shared.session.lock().await;
        let identity = session.identity();
        let locked = session.state() == ExamState::Locked;
        let current = session.current_question();
        let timer = session.timer();
        let monitor = session.monitor();

        SessionSnapshot {
            exam_code: identity.code.clone(),
            name: identity.name.clone(),
            category: identity.category.clone(),
            state: session.state(),
            current_index: session.current_index(),
            total_questions: session.questions().len(),
            current_question: (!locked).then(|| PublicQuestion::from(current)),
            current_answer: session.answer_for(current.id),
            answered_questions: session.answers().keys().copied().collect(),
            answered_count: session.answered_count(),
            progress_percent: session.progress_percent(),
            is_last: session.is_last(),
            remaining_seconds: timer.remaining(),
            clock: format_clock(timer.remaining()),
            running_low: timer.is_running_low(),
            tab_switches: monitor.tab_switches(),
            tab_switch_threshold: monitor.policy().threshold,
            warning: monitor.banner(),
            result: session.result().cloned(),
        }
    }

    /// Stops the background tasks without submitting.
    pub fn shutdown(&self) {
        let mut tasks = self.shared.tasks();
        if let Some(ticker) = tasks.ticker.take() {
            ticker.abort();
        }
        if let Some(grace) = tasks.grace.take() {
            grace.abort();
        }
    }

    /// Marks the lock time and cancels the tasks that did not perform this
    /// submission. The task that did is left to return on its own.
    fn stop_tasks(&self, trigger: SubmitTrigger) {
        let mut tasks = self.shared.tasks();
        tasks.locked_at = Some(Instant::now());
        let ticker = tasks.ticker.take();
        let grace = tasks.grace.take();
        drop(tasks);

        if trigger != SubmitTrigger::TimerExpired {
            if let Some(ticker) = ticker {
                ticker.abort();
            }
        }
        if trigger != SubmitTrigger::IntegrityAutoSubmit {
            if let Some(grace) = grace {
                grace.abort();
            }
        }
    }
}
