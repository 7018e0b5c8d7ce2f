mod ids;
mod item;
mod lesson;
mod profile;
mod summary;

pub use ids::{LessonId, ParseIdError, SummaryId};
pub use item::{ItemError, ItemName};
pub use lesson::{GUIDEBOOK_WORDS, LessonCatalog, LessonDefinition, LessonError};
pub use profile::{LEVEL_SPAN, ProfileError, ProgressionRules, UserProfile};
pub use summary::{LessonSummary, LessonSummaryError};
