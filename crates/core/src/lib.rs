#![forbid(unsafe_code)]

//! Domain model for lesson practice: lessons, the per-session state machine,
//! and the learner profile with its leveling rule.

pub mod error;
pub mod model;
pub mod session;
pub mod time;

pub use error::Error;
pub use time::Clock;
