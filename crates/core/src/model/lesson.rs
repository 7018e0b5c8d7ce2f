use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::ids::LessonId;
use crate::model::item::{ItemError, ItemName};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson {0} has no items")]
    NoItems(LessonId),

    #[error(transparent)]
    Item(#[from] ItemError),
}

//
// ─── LESSON DEFINITION ─────────────────────────────────────────────────────────
//

/// Immutable, ordered list of items taught by one lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonDefinition {
    id: LessonId,
    items: Vec<ItemName>,
}

impl LessonDefinition {
    /// Build a lesson from already validated items.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::NoItems` if `items` is empty.
    pub fn new(id: LessonId, items: Vec<ItemName>) -> Result<Self, LessonError> {
        if items.is_empty() {
            return Err(LessonError::NoItems(id));
        }
        Ok(Self { id, items })
    }

    /// Build a lesson from raw words.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Item` for a blank word, or `LessonError::NoItems`.
    pub fn from_words<I, S>(id: LessonId, words: I) -> Result<Self, LessonError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = words
            .into_iter()
            .map(ItemName::new)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(id, items)
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn items(&self) -> &[ItemName] {
        &self.items
    }

    /// Number of passes required to finish the lesson.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Every word that has a reference demonstration, in guidebook order.
pub const GUIDEBOOK_WORDS: [&str; 12] = [
    "Help", "Yes", "No", "Sorry", "How", "Bye", "Where", "What", "Who", "Hello", "Please",
    "Thanks",
];

/// Lesson lookup keyed by id, with a fallback for unknown ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonCatalog {
    lessons: BTreeMap<LessonId, LessonDefinition>,
    fallback: LessonDefinition,
}

impl LessonCatalog {
    /// Create a catalog that answers unknown ids with `fallback`.
    ///
    /// The fallback is also registered under its own id.
    #[must_use]
    pub fn new(fallback: LessonDefinition) -> Self {
        let mut lessons = BTreeMap::new();
        lessons.insert(fallback.id(), fallback.clone());
        Self { lessons, fallback }
    }

    /// The shipped catalog: lessons 1 and 2, both covering Help / Yes / No.
    ///
    /// # Errors
    ///
    /// Returns `LessonError` only if the built-in word lists are invalid.
    pub fn builtin() -> Result<Self, LessonError> {
        let first = LessonDefinition::from_words(LessonId::new(1), ["Help", "Yes", "No"])?;
        let second = LessonDefinition::from_words(LessonId::new(2), ["Help", "Yes", "No"])?;
        Ok(Self::new(first).with_lesson(second))
    }

    #[must_use]
    pub fn with_lesson(mut self, lesson: LessonDefinition) -> Self {
        self.lessons.insert(lesson.id(), lesson);
        self
    }

    /// Returns the lesson registered for `id`, or the fallback lesson.
    #[must_use]
    pub fn lookup(&self, id: LessonId) -> &LessonDefinition {
        self.lessons.get(&id).unwrap_or(&self.fallback)
    }

    #[must_use]
    pub fn contains(&self, id: LessonId) -> bool {
        self.lessons.contains_key(&id)
    }

    #[must_use]
    pub fn fallback(&self) -> &LessonDefinition {
        &self.fallback
    }

    pub fn lessons(&self) -> impl Iterator<Item = &LessonDefinition> {
        self.lessons.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_lesson_is_rejected() {
        let err = LessonDefinition::new(LessonId::new(3), Vec::new()).unwrap_err();
        assert_eq!(err, LessonError::NoItems(LessonId::new(3)));
    }

    #[test]
    fn blank_word_is_rejected() {
        let err = LessonDefinition::from_words(LessonId::new(3), ["Help", " "]).unwrap_err();
        assert_eq!(err, LessonError::Item(ItemError::EmptyName));
    }

    #[test]
    fn builtin_catalog_has_two_lessons() {
        let catalog = LessonCatalog::builtin().unwrap();
        assert_eq!(catalog.lessons().count(), 2);
        let words: Vec<_> = catalog
            .lookup(LessonId::new(2))
            .items()
            .iter()
            .map(ItemName::as_str)
            .collect();
        assert_eq!(words, ["Help", "Yes", "No"]);
    }

    #[test]
    fn unknown_lesson_falls_back() {
        let catalog = LessonCatalog::builtin().unwrap();
        assert!(!catalog.contains(LessonId::new(99)));
        assert_eq!(catalog.lookup(LessonId::new(99)).id(), LessonId::new(1));
    }

    #[test]
    fn guidebook_words_are_valid_items() {
        for word in GUIDEBOOK_WORDS {
            assert!(ItemName::new(word).is_ok());
        }
    }
}
