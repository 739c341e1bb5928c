//! Catalog media: books and videos
//!
//! Books and videos share one shape; they differ only in the table they live
//! in and in naming the creator column `author` or `creator`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which catalog a media item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Book,
    Video,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Book, MediaKind::Video];

    /// Table holding this kind
    pub fn table(&self) -> &'static str {
        match self {
            MediaKind::Book => "books",
            MediaKind::Video => "videos",
        }
    }

    /// Column holding the author / creator name
    pub fn creator_column(&self) -> &'static str {
        match self {
            MediaKind::Book => "author",
            MediaKind::Video => "creator",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Book => "book",
            MediaKind::Video => "video",
        }
    }

    /// Capitalised name used in messages
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Book => "Book",
            MediaKind::Video => "Video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "book" | "books" => Ok(MediaKind::Book),
            "video" | "videos" => Ok(MediaKind::Video),
            _ => Err(anyhow::anyhow!("Invalid media kind: {}", s)),
        }
    }
}

/// Availability of a catalog entry. Suspended media is hidden from the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    #[default]
    Available,
    Suspended,
}

impl MediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Available => "available",
            MediaStatus::Suspended => "suspended",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            MediaStatus::Available => MediaStatus::Suspended,
            MediaStatus::Suspended => MediaStatus::Available,
        }
    }
}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(MediaStatus::Available),
            "suspended" => Ok(MediaStatus::Suspended),
            _ => Err(anyhow::anyhow!("Invalid media status: {}", s)),
        }
    }
}

/// A book or a video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub kind: MediaKind,
    pub id: i64,
    pub title: String,
    /// Author of a book, creator of a video
    pub creator: String,
    pub link: String,
    pub age_group: String,
    pub category: String,
    pub description: String,
    pub rating: f64,
    pub source: String,
    pub status: MediaStatus,
    pub created_at: DateTime<Utc>,
}

impl MediaItem {
    pub fn is_available(&self) -> bool {
        self.status == MediaStatus::Available
    }

    pub fn age_range(&self) -> Option<AgeRange> {
        AgeRange::parse(&self.age_group)
    }
}

/// Fields of a new catalog entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMedia {
    pub title: String,
    #[serde(alias = "author")]
    pub creator: String,
    pub link: String,
    #[serde(default)]
    pub age_group: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rating: f64,
}

/// Partial edit of a catalog entry; only provided fields change
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaPatch {
    pub title: Option<String>,
    #[serde(alias = "author")]
    pub creator: Option<String>,
    pub link: Option<String>,
    pub age_group: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
}

impl MediaPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.creator.is_none()
            && self.link.is_none()
            && self.age_group.is_none()
            && self.category.is_none()
            && self.description.is_none()
            && self.rating.is_none()
    }

    pub fn apply(&self, item: &mut MediaItem) {
        if let Some(ref v) = self.title {
            item.title = v.clone();
        }
        if let Some(ref v) = self.creator {
            item.creator = v.clone();
        }
        if let Some(ref v) = self.link {
            item.link = v.clone();
        }
        if let Some(ref v) = self.age_group {
            item.age_group = v.clone();
        }
        if let Some(ref v) = self.category {
            item.category = v.clone();
        }
        if let Some(ref v) = self.description {
            item.description = v.clone();
        }
        if let Some(v) = self.rating {
            item.rating = v;
        }
    }
}

/// Maximum page size for catalog listings
pub const MAX_PAGE_SIZE: i64 = 100;
/// Page size used when none is given
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Catalog listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaQuery {
    /// Case-insensitive title substring
    pub search: Option<String>,
    /// Exact source match
    pub source: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl MediaQuery {
    /// 1-based page number
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn size(&self) -> i64 {
        self.size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.size())
    }

    /// Trimmed, non-empty search text
    pub fn search_text(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn source_filter(&self) -> Option<&str> {
        self.source.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// A page of results with the overall match count
#[derive(Debug, Clone, Serialize)]
pub struct Paged<T> {
    pub total: i64,
    pub items: Vec<T>,
}

impl<T> Paged<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
        Paged {
            total: self.total,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

/// Inclusive age range parsed from a free-text age group.
///
/// `max` is `None` for open-ended groups such as `8+`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgeRange {
    pub min: u32,
    pub max: Option<u32>,
}

/// Ages above this are treated as noise rather than an age group
const MAX_PLAUSIBLE_AGE: u32 = 120;

impl AgeRange {
    /// Parse labels such as `5-12`, `Ages 3-5`, `3 to 5 years`, `8+`,
    /// `8 and up`, `under 6`, `all ages`.
    ///
    /// Returns `None` for labels that carry no usable age (`Unknown`, empty).
    pub fn parse(label: &str) -> Option<AgeRange> {
        let text = label.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }
        if text.contains("all ages") || text == "all" {
            return Some(AgeRange { min: 0, max: None });
        }

        let numbers: Vec<u32> = text
            .split(|c: char| !c.is_ascii_digit())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();

        if numbers.iter().any(|&n| n > MAX_PLAUSIBLE_AGE) {
            return None;
        }

        match numbers.as_slice() {
            [] => None,
            [n] => {
                let open_ended = text.contains('+')
                    || text.contains("and up")
                    || text.contains("and over")
                    || text.contains("older")
                    || text.contains("plus");
                let capped = text.contains("under") || text.contains("up to");
                if open_ended {
                    Some(AgeRange { min: *n, max: None })
                } else if capped {
                    Some(AgeRange { min: 0, max: Some(*n) })
                } else {
                    Some(AgeRange { min: *n, max: Some(*n) })
                }
            }
            [a, b, ..] => Some(AgeRange {
                min: (*a).min(*b),
                max: Some((*a).max(*b)),
            }),
        }
    }

    pub fn contains(&self, age: u32) -> bool {
        age >= self.min && self.max.map_or(true, |max| age <= max)
    }
}

impl fmt::Display for AgeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", self.min),
            Some(max) => write!(f, "{}-{}", self.min, max),
            None => write!(f, "{}+", self.min),
        }
    }
}
