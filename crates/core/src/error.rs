use thiserror::Error;

use crate::model::{ItemError, LessonError, LessonSummaryError, ProfileError};
use crate::session::SessionError;

/// Umbrella error for callers that do not care which domain rule failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Item(#[from] ItemError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Summary(#[from] LessonSummaryError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
