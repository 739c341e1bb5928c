//! Candidate scoring
//!
//! Scores catalog entries against the topic terms, the child's interests
//! and age. The weights favour title hits over category, creator and
//! description hits.

use crate::models::{AgeRange, InterestKind, MediaItem, MediaKind};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

const TITLE_WEIGHT: f64 = 3.0;
const CATEGORY_WEIGHT: f64 = 2.0;
const CREATOR_WEIGHT: f64 = 1.5;
const DESCRIPTION_WEIGHT: f64 = 1.0;
const STORED_INTEREST_WEIGHT: f64 = 1.5;
const MENTIONED_INTEREST_WEIGHT: f64 = 2.0;
const RATING_WEIGHT: f64 = 0.4;
const AGE_FIT_WEIGHT: f64 = 1.0;

/// Rating at or above which an item earns the `top_rated` badge
pub const TOP_RATED_THRESHOLD: f64 = 4.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    TopRated,
    InterestMatch,
    AgeMatch,
}

/// Inputs that shape a ranking besides the candidates themselves
#[derive(Debug, Clone, Default)]
pub struct RankContext {
    pub terms: Vec<String>,
    /// Interests stored on the child's profile
    pub profile_interests: Vec<InterestKind>,
    /// Interests named in the current message
    pub mentioned_interests: Vec<InterestKind>,
    pub age: Option<u32>,
    /// Items that must not be returned
    pub exclude: HashSet<(MediaKind, i64)>,
    pub max_items: usize,
}

#[derive(Debug, Clone)]
pub struct Scored {
    pub item: MediaItem,
    pub score: f64,
    pub age_range: Option<AgeRange>,
    pub badges: Vec<Badge>,
}

/// Whether lower-case `text` names the interest, or one of its keywords,
/// as a whole word
fn matches_interest(text: &str, interest: InterestKind) -> bool {
    let name = interest.as_str().to_lowercase();
    text.split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .any(|word| word == name || interest.keywords().contains(&word))
}

/// Lower-cased title, category and description
fn interest_text(item: &MediaItem) -> String {
    format!("{} {} {}", item.title, item.category, item.description).to_lowercase()
}

/// Whether the item is about any of `interests`
pub fn mentions_any(item: &MediaItem, interests: &[InterestKind]) -> bool {
    let text = interest_text(item);
    interests.iter().any(|interest| matches_interest(&text, *interest))
}

/// Whether the item may be shown at all: available, not excluded and
/// not outside the child's age
pub fn is_eligible(item: &MediaItem, ctx: &RankContext) -> bool {
    if !item.is_available() || ctx.exclude.contains(&(item.kind, item.id)) {
        return false;
    }
    match (ctx.age, item.age_range()) {
        (Some(age), Some(range)) => range.contains(age),
        _ => true,
    }
}

/// Score one candidate; `None` when it must not be recommended
pub fn score(item: &MediaItem, ctx: &RankContext) -> Option<Scored> {
    if !is_eligible(item, ctx) {
        return None;
    }

    let age_range = item.age_range();
    let age_match = ctx.age.is_some() && age_range.is_some();

    let title = item.title.to_lowercase();
    let category = item.category.to_lowercase();
    let creator = item.creator.to_lowercase();
    let description = item.description.to_lowercase();

    let mut total = 0.0;
    for term in &ctx.terms {
        if title.contains(term.as_str()) {
            total += TITLE_WEIGHT;
        }
        if category.contains(term.as_str()) {
            total += CATEGORY_WEIGHT;
        }
        if creator.contains(term.as_str()) {
            total += CREATOR_WEIGHT;
        }
        if description.contains(term.as_str()) {
            total += DESCRIPTION_WEIGHT;
        }
    }

    let haystack = interest_text(item);
    let mut interest_match = false;
    for interest in &ctx.mentioned_interests {
        if matches_interest(&haystack, *interest) {
            total += MENTIONED_INTEREST_WEIGHT;
            interest_match = true;
        }
    }
    for interest in &ctx.profile_interests {
        if matches_interest(&haystack, *interest) {
            total += STORED_INTEREST_WEIGHT;
            interest_match = true;
        }
    }

    total += item.rating.clamp(0.0, 5.0) * RATING_WEIGHT;
    if age_match {
        total += AGE_FIT_WEIGHT;
    }

    let mut badges = Vec::new();
    if item.rating >= TOP_RATED_THRESHOLD {
        badges.push(Badge::TopRated);
    }
    if interest_match {
        badges.push(Badge::InterestMatch);
    }
    if age_match {
        badges.push(Badge::AgeMatch);
    }

    Some(Scored {
        item: item.clone(),
        score: (total * 100.0).round() / 100.0,
        age_range,
        badges,
    })
}

/// Highest score first; ties go to the better rated, then the newer item
fn by_rank(a: &Scored, b: &Scored) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.item.rating.total_cmp(&a.item.rating))
        .then_with(|| b.item.id.cmp(&a.item.id))
}

/// Filter, score and order candidates, keeping at most `ctx.max_items`
pub fn rank(candidates: &[MediaItem], ctx: &RankContext) -> Vec<Scored> {
    let mut seen = HashSet::new();
    let mut scored: Vec<Scored> = candidates
        .iter()
        .filter(|item| seen.insert((item.kind, item.id)))
        .filter_map(|item| score(item, ctx))
        .collect();

    scored.sort_by(by_rank);
    scored.truncate(ctx.max_items);
    scored
}
