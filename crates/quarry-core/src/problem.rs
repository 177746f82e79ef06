//! The record model: one `Problem` per programming problem.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Problem difficulty. Datasets disagree on casing, so parsing is lenient
/// and anything unrecognized maps to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    #[default]
    Unknown,
}

impl FromStr for Difficulty {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "easy" => Difficulty::Easy,
            "medium" => Difficulty::Medium,
            "hard" => Difficulty::Hard,
            _ => Difficulty::Unknown,
        })
    }
}

/// A single programming-problem record, immutable once loaded.
///
/// `declared_id` is whatever identifier string the dataset carries; the
/// identifier resolver decides whether it is a usable canonical id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub declared_id: String,
    pub title: String,
    /// Full problem body. Absent or empty for title-only records.
    pub content: Option<String>,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub url: String,
}

impl Problem {
    /// Construct a record with just an id, title, and optional body.
    /// Mostly useful in tests and small fixtures.
    pub fn new(declared_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            declared_id: declared_id.into(),
            title: title.into(),
            content: None,
            difficulty: Difficulty::Unknown,
            tags: Vec::new(),
            url: String::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Whether this record has a non-empty body.
    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty())
    }
}
