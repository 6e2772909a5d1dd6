// src/exam/mod.rs

//! The exam core: countdown, integrity monitor, answers and navigation,
//! scoring and the exactly-once submission.

pub mod error;
pub mod monitor;
pub mod registry;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod timer;

pub use error::ExamError;
pub use monitor::{IntegrityMonitor, IntegrityPolicy, MonitorVerdict};
pub use registry::SessionRegistry;
pub use runtime::{SessionHandle, SessionSnapshot};
pub use scoring::{AnswerMap, ScoreSummary};
pub use session::{ExamPolicy, ExamSession, ExamState, SubmitTrigger};
pub use timer::{SessionTimer, TickOutcome};
