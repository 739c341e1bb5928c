//! Child interests

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Row of the `interests` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Interest {
    pub id: i64,
    pub name: String,
}

/// The fixed set of interests a child can pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InterestKind {
    Fiction,
    Nonfiction,
    Comic,
    Art,
    Geography,
    Science,
    Animals,
    History,
    Fantasy,
    Technology,
    Sports,
    Cooking,
}

/// Minimum number of interests a child profile must have
pub const MIN_CHILD_INTERESTS: usize = 3;

impl InterestKind {
    pub const ALL: [InterestKind; 12] = [
        InterestKind::Fiction,
        InterestKind::Nonfiction,
        InterestKind::Comic,
        InterestKind::Art,
        InterestKind::Geography,
        InterestKind::Science,
        InterestKind::Animals,
        InterestKind::History,
        InterestKind::Fantasy,
        InterestKind::Technology,
        InterestKind::Sports,
        InterestKind::Cooking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InterestKind::Fiction => "FICTION",
            InterestKind::Nonfiction => "NONFICTION",
            InterestKind::Comic => "COMIC",
            InterestKind::Art => "ART",
            InterestKind::Geography => "GEOGRAPHY",
            InterestKind::Science => "SCIENCE",
            InterestKind::Animals => "ANIMALS",
            InterestKind::History => "HISTORY",
            InterestKind::Fantasy => "FANTASY",
            InterestKind::Technology => "TECHNOLOGY",
            InterestKind::Sports => "SPORTS",
            InterestKind::Cooking => "COOKING",
        }
    }

    /// Lower-case words that count as a catalog match for this interest.
    ///
    /// Used both to spot interests named in a chat message and to match an
    /// item's category or description against a child's interests.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            InterestKind::Fiction => &["fiction", "story", "stories", "novel", "tale", "adventure"],
            InterestKind::Nonfiction => &["nonfiction", "non-fiction", "facts", "true", "biography"],
            InterestKind::Comic => &["comic", "comics", "graphic", "manga", "cartoon", "superhero"],
            InterestKind::Art => &["art", "drawing", "painting", "craft", "crafts", "music", "colour", "color"],
            InterestKind::Geography => &["geography", "map", "maps", "country", "countries", "world", "travel"],
            InterestKind::Science => &["science", "space", "planet", "planets", "experiment", "experiments", "nature", "physics", "chemistry"],
            InterestKind::Animals => &["animal", "animals", "dinosaur", "dinosaurs", "dog", "dogs", "cat", "cats", "horse", "ocean", "wildlife", "pet", "pets"],
            InterestKind::History => &["history", "historical", "ancient", "past", "knights", "pyramids"],
            InterestKind::Fantasy => &["fantasy", "magic", "dragon", "dragons", "wizard", "wizards", "fairy", "fairies", "unicorn", "princess"],
            InterestKind::Technology => &["technology", "tech", "robot", "robots", "computer", "computers", "coding", "engineering"],
            InterestKind::Sports => &["sport", "sports", "football", "soccer", "basketball", "swimming", "tennis", "game"],
            InterestKind::Cooking => &["cooking", "cook", "baking", "bake", "recipe", "recipes", "food", "kitchen"],
        }
    }

    /// Interest a single lower-case word refers to, if any
    pub fn from_keyword(word: &str) -> Option<InterestKind> {
        InterestKind::ALL
            .into_iter()
            .find(|kind| kind.keywords().contains(&word))
    }
}

impl fmt::Display for InterestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterestKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        InterestKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == upper)
            .ok_or_else(|| anyhow::anyhow!("Invalid interest: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_interests_parse() {
        for kind in InterestKind::ALL {
            assert_eq!(InterestKind::from_str(kind.as_str()).unwrap(), kind);
            assert_eq!(InterestKind::from_str(&kind.as_str().to_lowercase()).unwrap(), kind);
        }
        assert!(InterestKind::from_str("POETRY").is_err());
    }

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(InterestKind::from_keyword("dinosaur"), Some(InterestKind::Animals));
        assert_eq!(InterestKind::from_keyword("space"), Some(InterestKind::Science));
        assert_eq!(InterestKind::from_keyword("dragons"), Some(InterestKind::Fantasy));
        assert_eq!(InterestKind::from_keyword("homework"), None);
    }

    #[test]
    fn test_keywords_are_unique_across_interests() {
        let mut seen = std::collections::HashSet::new();
        for kind in InterestKind::ALL {
            for word in kind.keywords() {
                assert!(seen.insert(*word), "duplicate keyword {}", word);
            }
        }
    }
}
