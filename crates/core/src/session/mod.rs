//! Per-session state machine for one lesson.
//!
//! A round is `Presenting → AwaitingAttempt → Judging → RoundResolved`, after
//! which the session either presents the next queued item or ends in
//! `Completed` / `Failed`. All transitions go through
//! [`LessonSession::dispatch`]; events arriving in the wrong phase are rejected
//! without touching state.

mod machine;
mod types;

pub use machine::{DEFAULT_HEARTS, LessonSession};
pub use types::{
    EventKind, JudgeRequest, Phase, PhaseKind, RoundOutcome, RoundTicket, SessionError,
    SessionEvent, Step, Verdict,
};
