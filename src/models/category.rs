//! Spending category attached to every extracted transaction.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "category", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Food,
    Shopping,
    Entertainment,
    Transport,
    Utilities,
    Others,
    Uncategorized,
}

impl Category {
    /// Map a free-form label (e.g. a classifier reply) onto a category.
    pub fn from_label(label: &str) -> Option<Self> {
        let cleaned: String = label
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_uppercase();
        match cleaned.as_str() {
            "FOOD" => Some(Self::Food),
            "SHOPPING" => Some(Self::Shopping),
            "ENTERTAINMENT" => Some(Self::Entertainment),
            "TRANSPORT" | "TRANSPORTATION" => Some(Self::Transport),
            "UTILITIES" | "UTILITY" => Some(Self::Utilities),
            "OTHERS" | "OTHER" => Some(Self::Others),
            "UNCATEGORIZED" => Some(Self::Uncategorized),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_label_ignores_case_and_punctuation() {
        assert_eq!(Category::from_label(" food.\n"), Some(Category::Food));
        assert_eq!(Category::from_label("Transportation"), Some(Category::Transport));
        assert_eq!(Category::from_label("utility"), Some(Category::Utilities));
    }

    #[test]
    fn from_label_unknown() {
        assert_eq!(Category::from_label("groceries and more"), None);
        assert_eq!(Category::from_label(""), None);
    }

    #[test]
    fn serializes_screaming_case() {
        let json = serde_json::to_string(&Category::Uncategorized).unwrap();
        assert_eq!(json, "\"UNCATEGORIZED\"");
    }
}
