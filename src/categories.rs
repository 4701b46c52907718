//! Keyword-derived category labels for handoff content.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Meeting,
    Bug,
    General,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Meeting => "MEETING",
            Category::Bug => "BUG",
            Category::General => "GENERAL",
        }
    }

    /// Case-insensitive parse of a caller-supplied label.
    pub fn parse(s: &str) -> Option<Category> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MEETING" => Some(Category::Meeting),
            "BUG" => Some(Category::Bug),
            "GENERAL" => Some(Category::General),
            _ => None,
        }
    }
}

/// Derive category labels from content. First match wins: meeting keywords
/// are checked before bug keywords, everything else is GENERAL.
pub fn derive(content: &str) -> Vec<Category> {
    let lowered = content.to_lowercase();
    if lowered.contains("meeting") || lowered.contains("회의") {
        return vec![Category::Meeting];
    }
    if lowered.contains("bug") || lowered.contains("오류") {
        return vec![Category::Bug];
    }
    vec![Category::General]
}
