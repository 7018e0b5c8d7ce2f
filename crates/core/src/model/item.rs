use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ItemError {
    #[error("item name cannot be empty")]
    EmptyName,
}

/// Validated vocabulary item (trimmed, non-empty), e.g. the sign for "Help".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemName(String);

impl ItemName {
    /// Create a validated item name.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::EmptyName` if the name is empty after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, ItemError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ItemError::EmptyName);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ItemName {
    type Error = ItemError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ItemName> for String {
    fn from(value: ItemName) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_whitespace() {
        let item = ItemName::new("  Help ").unwrap();
        assert_eq!(item.as_str(), "Help");
    }

    #[test]
    fn rejects_blank_names() {
        assert_eq!(ItemName::new("   "), Err(ItemError::EmptyName));
    }

    #[test]
    fn deserialization_validates() {
        let ok: ItemName = serde_json::from_str("\"Yes\"").unwrap();
        assert_eq!(ok.as_str(), "Yes");
        assert!(serde_json::from_str::<ItemName>("\"\"").is_err());
    }
}
