//! Chat message parsing
//!
//! Turns a child's free-text message into an intent, topic terms, an
//! optional media kind, an optional stated age and any interests named.

use crate::models::{InterestKind, MediaKind};

/// What the message asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    Help,
    Search,
    /// More results for the previous topic
    More,
    /// Items similar to the titled one
    MoreLike(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub intent: Intent,
    pub terms: Vec<String>,
    pub kind: Option<MediaKind>,
    pub age: Option<u32>,
    pub interests: Vec<InterestKind>,
}

/// Prefix the client sends back to ask for similar items
pub const MORE_LIKE_PREFIX: &str = "more like:";

/// Youngest and oldest age a child may state
const STATED_AGE: std::ops::RangeInclusive<u32> = 2..=17;

const STOP_WORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "anything", "are", "as", "at", "be", "can", "could",
    "do", "does", "find", "for", "from", "get", "give", "good", "got", "have", "i", "i'm", "im",
    "in", "into", "is", "it", "its", "just", "kid", "kids", "know", "like", "likes", "love",
    "loves", "me", "my", "need", "of", "on", "or", "please", "recommend", "recommendation",
    "recommendations", "show", "some", "something", "suggest", "tell", "that", "the", "there",
    "these", "thing", "things", "this", "to", "want", "wanna", "what", "which", "with", "would",
    "you", "your", "am", "old", "year", "years", "age", "aged", "yo", "fun", "cool", "new",
    "really", "very", "so", "lot", "lots", "other", "then", "more", "another", "again", "next",
    "one", "ones", "here", "there", "hello", "thanks", "thank",
];

const GREETINGS: &[&str] = &["hi", "hello", "hey", "hiya", "howdy", "yo", "morning", "afternoon", "evening", "greetings", "sup"];

const HELP_WORDS: &[&str] = &["help", "how", "what", "can", "you", "do", "does", "work", "this", "i"];

const BOOK_WORDS: &[&str] = &["book", "books", "read", "reading", "novel", "novels", "ebook"];
const VIDEO_WORDS: &[&str] = &["video", "videos", "watch", "watching", "movie", "movies", "film", "films", "clip", "clips", "cartoons"];

const MORE_WORDS: &[&str] = &["more", "another", "again", "next", "others", "else", "different"];

/// Split into lower-case word tokens, keeping inner apostrophes and hyphens
fn tokenize(message: &str) -> Vec<String> {
    message
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'))
        .map(|t| t.trim_matches(|c| c == '\'' || c == '-'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fold simple English plurals: `stories` -> `story`, `boxes` -> `box`, `cats` -> `cat`
pub fn singular(word: &str) -> String {
    let n = word.len();
    if n > 4 && word.ends_with("ies") {
        return format!("{}y", &word[..n - 3]);
    }
    if n > 4 && ["ches", "shes", "xes", "sses", "oes"].iter().any(|s| word.ends_with(s)) {
        return word[..n - 2].to_string();
    }
    if n > 3 && word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") {
        return word[..n - 1].to_string();
    }
    word.to_string()
}

/// Stated age: "I am 7", "I'm 7", "age 7", "7 years old", "7yo"
fn stated_age(tokens: &[String]) -> Option<(usize, u32)> {
    for (i, token) in tokens.iter().enumerate() {
        let (digits, suffix) = token.split_at(token.find(|c: char| !c.is_ascii_digit()).unwrap_or(token.len()));
        let Ok(n) = digits.parse::<u32>() else {
            continue;
        };
        if !STATED_AGE.contains(&n) {
            continue;
        }

        let before = i.checked_sub(1).map(|j| tokens[j].as_str());
        let after = tokens.get(i + 1).map(String::as_str);

        let by_suffix = matches!(suffix, "yo" | "yrs" | "y");
        let by_prefix = matches!(before, Some("am" | "i'm" | "im" | "age" | "aged"));
        let by_unit = matches!(after, Some("year" | "years" | "yr" | "yrs" | "yo"));
        if (suffix.is_empty() && (by_prefix || by_unit)) || by_suffix {
            return Some((i, n));
        }
    }
    None
}

fn media_kind(tokens: &[String]) -> Option<MediaKind> {
    let book = tokens.iter().any(|t| BOOK_WORDS.contains(&t.as_str()));
    let video = tokens.iter().any(|t| VIDEO_WORDS.contains(&t.as_str()));
    match (book, video) {
        (true, false) => Some(MediaKind::Book),
        (false, true) => Some(MediaKind::Video),
        _ => None,
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}

/// Parse a chat message
pub fn parse(message: &str) -> ParsedQuery {
    let trimmed = message.trim();

    let follow_up = strip_prefix_ignore_case(trimmed, MORE_LIKE_PREFIX).or_else(|| {
        strip_prefix_ignore_case(trimmed, "more like")
            .filter(|rest| !rest.starts_with(char::is_alphanumeric))
    });
    if let Some(rest) = follow_up {
        let title = rest.trim().trim_matches('"').trim();
        if !title.is_empty() {
            return ParsedQuery {
                intent: Intent::MoreLike(title.to_string()),
                terms: Vec::new(),
                kind: None,
                age: None,
                interests: Vec::new(),
            };
        }
    }

    let tokens = tokenize(trimmed);
    let age = stated_age(&tokens);
    let kind = media_kind(&tokens);

    let mut terms: Vec<String> = Vec::new();
    let mut interests: Vec<InterestKind> = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        if age.is_some_and(|(at, _)| at == i) || token.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if let Some(interest) = InterestKind::from_keyword(token) {
            if !interests.contains(&interest) {
                interests.push(interest);
            }
        }
        let word = token.as_str();
        let term = singular(word);
        if STOP_WORDS.contains(&word)
            || STOP_WORDS.contains(&term.as_str())
            || GREETINGS.contains(&word)
            || HELP_WORDS.contains(&word)
            || BOOK_WORDS.contains(&word)
            || VIDEO_WORDS.contains(&word)
            || term.chars().count() < 2
        {
            continue;
        }
        if !terms.contains(&term) {
            terms.push(term);
        }
    }

    let intent = if terms.is_empty() && interests.is_empty() {
        if tokens.iter().any(|t| MORE_WORDS.contains(&t.as_str())) {
            Intent::More
        } else if tokens.iter().any(|t| t == "help")
            || (!tokens.is_empty() && tokens.iter().all(|t| HELP_WORDS.contains(&t.as_str())))
        {
            Intent::Help
        } else if tokens.iter().any(|t| GREETINGS.contains(&t.as_str())) {
            Intent::Greeting
        } else {
            Intent::Search
        }
    } else {
        Intent::Search
    };

    ParsedQuery {
        intent,
        terms,
        kind,
        age: age.map(|(_, n)| n),
        interests,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_greeting_and_help() {
        assert_eq!(parse("Hi!").intent, Intent::Greeting);
        assert_eq!(parse("hello there").intent, Intent::Greeting);
        assert_eq!(parse("hey").intent, Intent::Greeting);
        assert_eq!(parse("help").intent, Intent::Help);
        assert_eq!(parse("what can you do?").intent, Intent::Help);
        assert_eq!(parse("Help!").terms, Vec::<String>::new());
        assert_eq!(parse("how does this work").intent, Intent::Help);

        let q = parse("help me find dinosaur books");
        assert_eq!(q.intent, Intent::Search);
        assert_eq!(q.terms, vec!["dinosaur"]);
    }

    #[test]
    fn test_more_and_more_like() {
        assert_eq!(parse("more please").intent, Intent::More);
        assert_eq!(parse("show me another one").intent, Intent::More);
        assert_eq!(parse("more likely dragons").intent, Intent::Search);
        assert_eq!(parse("Show me more").intent, Intent::More);
        assert_eq!(
            parse("more like: The Very Hungry Caterpillar").intent,
            Intent::MoreLike("The Very Hungry Caterpillar".to_string())
        );
        assert_eq!(
            parse("More like \"Space Cats\"").intent,
            Intent::MoreLike("Space Cats".to_string())
        );
    }

    #[test]
    fn test_terms_drop_stop_words_and_fold_plurals() {
        let q = parse("Can you find me some books about dinosaurs and volcanoes?");
        assert_eq!(q.intent, Intent::Search);
        assert_eq!(q.terms, vec!["dinosaur", "volcano"]);
        assert_eq!(q.kind, Some(MediaKind::Book));
        assert_eq!(q.interests, vec![InterestKind::Animals]);
    }

    #[test]
    fn test_media_kind() {
        assert_eq!(parse("I want to watch something about space").kind, Some(MediaKind::Video));
        assert_eq!(parse("read about space").kind, Some(MediaKind::Book));
        assert_eq!(parse("books or videos about space").kind, None);
        assert_eq!(parse("space").kind, None);
    }

    #[test]
    fn test_stated_age() {
        assert_eq!(parse("I am 7 and like robots").age, Some(7));
        assert_eq!(parse("i'm 9").age, Some(9));
        assert_eq!(parse("stories for a 6 year old").age, Some(6));
        assert_eq!(parse("books for 10 years old").age, Some(10));
        assert_eq!(parse("8yo space books").age, Some(8));
        assert_eq!(parse("top 10 dinosaur facts").age, None);
        assert_eq!(parse("I am 45").age, None);
    }

    #[test]
    fn test_age_not_left_in_terms() {
        let q = parse("I am 7 and like robots");
        assert_eq!(q.terms, vec!["robot"]);
        assert_eq!(q.interests, vec![InterestKind::Technology]);
    }

    #[test]
    fn test_singular() {
        assert_eq!(singular("stories"), "story");
        assert_eq!(singular("boxes"), "box");
        assert_eq!(singular("cats"), "cat");
        assert_eq!(singular("glass"), "glass");
        assert_eq!(singular("bus"), "bus");
        assert_eq!(singular("is"), "is");
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(message in "\\PC{0,200}") {
            let _ = parse(&message);
        }

        #[test]
        fn prop_terms_are_lowercase_and_unique(message in "[A-Za-z ]{0,80}") {
            let q = parse(&message);
            let mut seen = std::collections::HashSet::new();
            for term in &q.terms {
                prop_assert_eq!(term.to_lowercase(), term.clone());
                prop_assert!(seen.insert(term.clone()));
                prop_assert!(!STOP_WORDS.contains(&term.as_str()));
            }
        }
    }
}
