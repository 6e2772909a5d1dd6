// src/exam/session.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    exam::{
        error::ExamError,
        monitor::{IntegrityMonitor, IntegrityPolicy, MonitorVerdict},
        scoring::{self, AnswerMap},
        timer::{SessionTimer, TickOutcome},
    },
    models::{
        candidate::CandidateIdentity,
        exam_record::{ExamResult, ResultStatus},
        question::{AnswerValue, Question},
    },
};

/// Lifecycle of one attempt:
/// `NotStarted -> InProgress -> (Warning) -> Submitting -> Locked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamState {
    NotStarted,
    InProgress,
    /// At least one integrity warning was issued; the exam is still live.
    Warning,
    Submitting,
    /// Terminal.
    Locked,
}

impl ExamState {
    pub fn is_live(&self) -> bool {
        matches!(self, ExamState::InProgress | ExamState::Warning)
    }
}

/// What caused a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitTrigger {
    Student,
    TimerExpired,
    IntegrityAutoSubmit,
}

impl SubmitTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitTrigger::Student => "student",
            SubmitTrigger::TimerExpired => "timer_expired",
            SubmitTrigger::IntegrityAutoSubmit => "integrity_auto_submit",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "timer_expired" => SubmitTrigger::TimerExpired,
            "integrity_auto_submit" => SubmitTrigger::IntegrityAutoSubmit,
            _ => SubmitTrigger::Student,
        }
    }
}

/// Per-attempt settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamPolicy {
    pub duration_secs: u64,
    pub integrity: IntegrityPolicy,
}

impl Default for ExamPolicy {
    fn default() -> Self {
        Self {
            duration_secs: crate::config::DEFAULT_EXAM_DURATION_SECS,
            integrity: IntegrityPolicy::default(),
        }
    }
}

/// Proof that the submit guard was passed. Consumed by `finish` or
/// `abort_submit`, so a submission can only be completed once.
#[derive(Debug)]
pub struct SubmitTicket {
    trigger: SubmitTrigger,
    resume: ExamState,
}

impl SubmitTicket {
    pub fn trigger(&self) -> SubmitTrigger {
        self.trigger
    }
}

/// State of one exam attempt: questions, answers, pointer, clock and monitor.
#[derive(Debug)]
pub struct ExamSession {
    identity: CandidateIdentity,
    questions: Vec<Question>,
    answers: AnswerMap,
    current: usize,
    timer: SessionTimer,
    monitor: IntegrityMonitor,
    state: ExamState,
    result: Option<ExamResult>,
}

impl ExamSession {
    pub fn new(
        identity: CandidateIdentity,
        questions: Vec<Question>,
        policy: ExamPolicy,
    ) -> Result<Self, ExamError> {
        if questions.is_empty() {
            return Err(ExamError::NoQuestions {
                category: identity.category,
            });
        }

        Ok(Self {
            identity,
            questions,
            answers: AnswerMap::new(),
            current: 0,
            timer: SessionTimer::new(policy.duration_secs),
            monitor: IntegrityMonitor::new(policy.integrity),
            state: ExamState::NotStarted,
            result: None,
        })
    }

    pub fn start(&mut self) -> Result<(), ExamError> {
        match self.state {
            ExamState::NotStarted => {
                self.state = ExamState::InProgress;
                Ok(())
            }
            ExamState::InProgress | ExamState::Warning => Ok(()),
            ExamState::Submitting | ExamState::Locked => Err(ExamError::Locked),
        }
    }

    pub fn state(&self) -> ExamState {
        self.state
    }

    pub fn identity(&self) -> &CandidateIdentity {
        &self.identity
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn timer(&self) -> &SessionTimer {
        &self.timer
    }

    pub fn monitor(&self) -> &IntegrityMonitor {
        &self.monitor
    }

    pub fn result(&self) -> Option<&ExamResult> {
        self.result.as_ref()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> &Question {
        &self.questions[self.current]
    }

    pub fn is_last(&self) -> bool {
        self.current + 1 == self.questions.len()
    }

    // ---- answers ----

    /// Stores `value` for `question_id`, replacing any earlier selection.
    pub fn set_answer(&mut self, question_id: i64, value: AnswerValue) -> Result<(), ExamError> {
        self.ensure_live()?;

        let question = self
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or(ExamError::UnknownQuestion(question_id))?;

        if !question.accepts(&value) {
            return Err(ExamError::InvalidAnswer {
                question_id,
                reason: format!("'{}' is not a valid {} answer", value, question.kind.as_str()),
            });
        }

        self.answers.insert(question_id, value);
        Ok(())
    }

    pub fn answer_for(&self, question_id: i64) -> Option<AnswerValue> {
        self.answers.get(&question_id).copied()
    }

    pub fn is_answered(&self, question_id: i64) -> bool {
        self.answers.contains_key(&question_id)
    }

    pub fn answered_count(&self) -> usize {
        self.questions.iter().filter(|q| self.is_answered(q.id)).count()
    }

    /// Position-based progress, as shown above the question card.
    pub fn progress_percent(&self) -> u32 {
        scoring::percentage(self.current + 1, self.questions.len())
    }

    // ---- navigation ----

    /// Moves to the next question. Returns false at the last question.
    pub fn next(&mut self) -> Result<bool, ExamError> {
        self.ensure_live()?;
        if self.is_last() {
            return Ok(false);
        }
        self.current += 1;
        Ok(true)
    }

    /// Moves to the previous question. Returns false at the first question.
    pub fn previous(&mut self) -> Result<bool, ExamError> {
        self.ensure_live()?;
        if self.current == 0 {
            return Ok(false);
        }
        self.current -= 1;
        Ok(true)
    }

    // ---- clock and monitor ----

    /// Advances the clock by one second. Ticks outside a live session are no-ops.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.state.is_live() {
            return TickOutcome::Idle;
        }
        self.timer.tick()
    }

    pub fn visibility_lost(&mut self) -> Result<MonitorVerdict, ExamError> {
        match self.state {
            ExamState::NotStarted => Err(ExamError::NotStarted),
            ExamState::Submitting | ExamState::Locked => Ok(MonitorVerdict::Ignored),
            ExamState::InProgress | ExamState::Warning => {
                self.state = ExamState::Warning;
                Ok(self.monitor.on_visibility_lost())
            }
        }
    }

    // ---- submission ----

    /// The submit guard. Only one caller can pass it per attempt.
    pub fn begin_submit(&mut self, trigger: SubmitTrigger) -> Result<SubmitTicket, ExamError> {
        match self.state {
            ExamState::NotStarted => Err(ExamError::NotStarted),
            ExamState::Submitting | ExamState::Locked => Err(ExamError::AlreadySubmitted),
            ExamState::InProgress | ExamState::Warning => {
                if trigger == SubmitTrigger::Student && !self.is_last() {
                    return Err(ExamError::NotOnLastQuestion);
                }
                let resume = self.state;
                self.state = ExamState::Submitting;
                Ok(SubmitTicket { trigger, resume })
            }
        }
    }

    /// Builds the result record for a submission in progress.
    pub fn grade(
        &self,
        ticket: &SubmitTicket,
        submitted_at: chrono::DateTime<chrono::Utc>,
    ) -> ExamResult {
        let summary = scoring::score(&self.answers, &self.questions);
        let status = if ticket.trigger == SubmitTrigger::IntegrityAutoSubmit {
            ResultStatus::Flagged
        } else {
            ResultStatus::Completed
        };

        ExamResult {
            id: Uuid::new_v4(),
            exam_code: self.identity.code.clone(),
            user_name: self.identity.name.clone(),
            church: self.identity.church.clone(),
            category: self.identity.category.clone(),
            score: summary.percentage,
            correct_answers: summary.correct as u32,
            total_questions: summary.total as u32,
            answers: self.answers.clone(),
            tab_switches: self.monitor.tab_switches(),
            duration_secs: self.timer.elapsed(),
            trigger: ticket.trigger,
            status,
            submitted_at,
        }
    }

    /// Completes the submission and locks the session.
    pub fn finish(&mut self, ticket: SubmitTicket, result: ExamResult) -> &ExamResult {
        debug_assert_eq!(self.state, ExamState::Submitting);
        let _ = ticket;
        self.state = ExamState::Locked;
        self.result.insert(result)
    }

    /// Rolls back a submission whose result could not be stored, so that a
    /// later trigger can try again. A scheduled automatic submission stays
    /// pending; its task keeps retrying.
    pub fn abort_submit(&mut self, ticket: SubmitTicket) {
        self.state = ticket.resume;
        if ticket.trigger == SubmitTrigger::TimerExpired {
            self.timer.rearm();
        }
    }

    fn ensure_live(&self) -> Result<(), ExamError> {
        match self.state {
            ExamState::NotStarted => Err(ExamError::NotStarted),
            ExamState::Submitting | ExamState::Locked => Err(ExamError::Locked),
            ExamState::InProgress | ExamState::Warning => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::question::QuestionKind;

    fn identity() -> CandidateIdentity {
        CandidateIdentity {
            code: "S-1001".to_string(),
            name: "Mina".to_string(),
            church: "St. Mark".to_string(),
            category: "كشافة".to_string(),
        }
    }

    fn questions(n: i64) -> Vec<Question> {
        (1..=n)
            .map(|id| Question {
                id,
                text: format!("Question {}", id),
                kind: QuestionKind::MultipleChoice,
                options: vec!["A".into(), "B".into(), "C".into()],
                correct_answer: AnswerValue::Choice(1),
                category: None,
                image_url: None,
                created_at: None,
            })
            .collect()
    }

    fn started(n: i64, policy: ExamPolicy) -> ExamSession {
        let mut s = ExamSession::new(identity(), questions(n), policy).unwrap();
        s.start().unwrap();
        s
    }

    #[test]
    fn empty_question_list_refuses_to_start() {
        let err = ExamSession::new(identity(), Vec::new(), ExamPolicy::default()).unwrap_err();
        assert!(matches!(err, ExamError::NoQuestions { .. }));
    }

    #[test]
    fn answers_overwrite_only_their_question() {
        let mut s = started(3, ExamPolicy::default());
        s.set_answer(1, AnswerValue::Choice(0)).unwrap();
        s.set_answer(2, AnswerValue::Choice(2)).unwrap();
        s.set_answer(1, AnswerValue::Choice(1)).unwrap();

        assert_eq!(s.answer_for(1), Some(AnswerValue::Choice(1)));
        assert_eq!(s.answer_for(2), Some(AnswerValue::Choice(2)));
        assert!(!s.is_answered(3));
        assert_eq!(s.answered_count(), 2);
    }

    #[test]
    fn rejects_unknown_and_malformed_answers() {
        let mut s = started(2, ExamPolicy::default());
        assert_eq!(
            s.set_answer(42, AnswerValue::Choice(0)),
            Err(ExamError::UnknownQuestion(42))
        );
        assert!(matches!(
            s.set_answer(1, AnswerValue::Flag(true)),
            Err(ExamError::InvalidAnswer { question_id: 1, .. })
        ));
        assert!(matches!(
            s.set_answer(1, AnswerValue::Choice(3)),
            Err(ExamError::InvalidAnswer { .. })
        ));
    }

    #[test]
    fn navigation_is_bounded_and_preserves_answers() {
        let mut s = started(3, ExamPolicy::default());
        assert!(!s.previous().unwrap());

        s.set_answer(1, AnswerValue::Choice(0)).unwrap();
        assert!(s.next().unwrap());
        s.set_answer(2, AnswerValue::Choice(1)).unwrap();
        assert!(s.next().unwrap());
        s.set_answer(3, AnswerValue::Choice(2)).unwrap();
        assert!(!s.next().unwrap());
        assert!(s.is_last());

        let before = s.answers().clone();
        s.previous().unwrap();
        s.previous().unwrap();
        assert_eq!(s.current_index(), 0);
        s.next().unwrap();
        s.next().unwrap();
        assert_eq!(s.answers(), &before);
    }

    #[test]
    fn student_submit_requires_last_question() {
        let mut s = started(2, ExamPolicy::default());
        assert!(matches!(
            s.begin_submit(SubmitTrigger::Student),
            Err(ExamError::NotOnLastQuestion)
        ));
        s.next().unwrap();
        assert!(s.begin_submit(SubmitTrigger::Student).is_ok());
        assert_eq!(s.state(), ExamState::Submitting);
    }

    #[test]
    fn second_submit_is_refused_and_answers_freeze() {
        let mut s = started(2, ExamPolicy::default());
        let ticket = s.begin_submit(SubmitTrigger::TimerExpired).unwrap();
        assert_eq!(
            s.begin_submit(SubmitTrigger::IntegrityAutoSubmit).unwrap_err(),
            ExamError::AlreadySubmitted
        );

        let result = s.grade(&ticket, chrono::Utc::now());
        s.finish(ticket, result);
        assert_eq!(s.state(), ExamState::Locked);
        assert_eq!(s.set_answer(1, AnswerValue::Choice(1)), Err(ExamError::Locked));
        assert_eq!(s.next(), Err(ExamError::Locked));
        assert_eq!(
            s.begin_submit(SubmitTrigger::Student).unwrap_err(),
            ExamError::AlreadySubmitted
        );
        assert_eq!(s.visibility_lost(), Ok(MonitorVerdict::Ignored));
    }

    #[test]
    fn three_of_five_scenario() {
        let mut s = started(5, ExamPolicy::default());
        for id in 1..=3 {
            s.set_answer(id, AnswerValue::Choice(1)).unwrap();
        }
        let ticket = s.begin_submit(SubmitTrigger::TimerExpired).unwrap();
        let result = s.grade(&ticket, chrono::Utc::now());

        assert_eq!(result.score, 60);
        assert_eq!(result.correct_answers, 3);
        assert_eq!(result.total_questions, 5);
        assert_eq!(result.status, ResultStatus::Completed);
    }

    #[test]
    fn timer_expiry_reported_once_then_idle() {
        let policy = ExamPolicy {
            duration_secs: 2,
            ..ExamPolicy::default()
        };
        let mut s = started(1, policy);
        assert_eq!(s.tick(), TickOutcome::Running(1));
        assert_eq!(s.tick(), TickOutcome::Expired);
        assert_eq!(s.tick(), TickOutcome::Idle);
    }

    #[test]
    fn ticks_before_start_do_nothing() {
        let mut s = ExamSession::new(identity(), questions(1), ExamPolicy::default()).unwrap();
        assert_eq!(s.tick(), TickOutcome::Idle);
        assert_eq!(s.timer().remaining(), 3600);
    }

    #[test]
    fn visibility_loss_enters_warning_state() {
        let mut s = started(1, ExamPolicy::default());
        let verdict = s.visibility_lost().unwrap();
        assert_eq!(verdict, MonitorVerdict::Warning { count: 1, threshold: 3 });
        assert_eq!(s.state(), ExamState::Warning);
        s.visibility_lost().unwrap();
        assert!(matches!(
            s.visibility_lost().unwrap(),
            MonitorVerdict::ScheduleAutoSubmit { count: 3, .. }
        ));
    }

    #[test]
    fn integrity_submission_is_flagged() {
        let policy = ExamPolicy {
            duration_secs: 60,
            integrity: IntegrityPolicy {
                threshold: 1,
                grace: Duration::from_secs(5),
            },
        };
        let mut s = started(1, policy);
        s.visibility_lost().unwrap();
        let ticket = s.begin_submit(SubmitTrigger::IntegrityAutoSubmit).unwrap();
        let result = s.grade(&ticket, chrono::Utc::now());
        assert_eq!(result.status, ResultStatus::Flagged);
        assert_eq!(result.tab_switches, 1);
    }

    #[test]
    fn abort_restores_previous_state_and_rearms_timer() {
        let policy = ExamPolicy {
            duration_secs: 1,
            ..ExamPolicy::default()
        };
        let mut s = started(1, policy);
        assert_eq!(s.tick(), TickOutcome::Expired);
        let ticket = s.begin_submit(SubmitTrigger::TimerExpired).unwrap();
        s.abort_submit(ticket);

        assert_eq!(s.state(), ExamState::InProgress);
        assert_eq!(s.tick(), TickOutcome::Expired);
    }

    #[test]
    fn aborted_auto_submit_stays_pending() {
        let policy = ExamPolicy {
            integrity: IntegrityPolicy {
                threshold: 1,
                grace: Duration::from_secs(5),
            },
            ..ExamPolicy::default()
        };
        let mut s = started(1, policy);
        s.visibility_lost().unwrap();
        let ticket = s.begin_submit(SubmitTrigger::IntegrityAutoSubmit).unwrap();
        s.abort_submit(ticket);

        assert_eq!(s.state(), ExamState::Warning);
        assert!(s.monitor().auto_submit_pending());
        assert!(matches!(
            s.visibility_lost().unwrap(),
            MonitorVerdict::FinalWarning { count: 2 }
        ));
    }
}
