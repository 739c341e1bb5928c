//! Recommendation chat
//!
//! `ChatService::respond` runs one exchange:
//! 1. resolve the chat session for the user
//! 2. parse the message into an intent and topic
//! 3. gather candidates, rank them, render the reply
//! 4. persist the turn and update the session

pub mod query;
pub mod ranking;
pub mod session;

use crate::config::ChatConfig;
use crate::db::repositories::{ChatRepository, InterestRepository, MediaRepository};
use crate::models::{
    AgeRange, ChatMessage, InterestKind, MediaItem, MediaKind, NewChatMessage, RecommendedRef, User,
};
use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use self::query::{Intent, ParsedQuery, MORE_LIKE_PREFIX};
use self::ranking::{Badge, RankContext, Scored};
use self::session::{ChatSession, ChatSessionTracker, Turn};

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// One recommended item as the client renders it
#[derive(Debug, Clone, Serialize)]
pub struct MediaCard {
    pub kind: MediaKind,
    pub id: i64,
    pub title: String,
    pub creator: String,
    pub link: String,
    pub category: String,
    pub description: String,
    pub age_group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_range: Option<AgeRange>,
    pub rating: f64,
    pub source: String,
    pub badges: Vec<Badge>,
    /// Follow-up message asking for similar items
    pub more_like_this: String,
    pub score: f64,
}

impl From<Scored> for MediaCard {
    fn from(scored: Scored) -> Self {
        let item = scored.item;
        Self {
            more_like_this: format!("{} {}", MORE_LIKE_PREFIX, item.title),
            kind: item.kind,
            id: item.id,
            title: item.title,
            creator: item.creator,
            link: item.link,
            category: item.category,
            description: item.description,
            age_group: item.age_group,
            age_range: scored.age_range,
            rating: item.rating,
            source: item.source,
            badges: scored.badges,
            score: scored.score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub items: Vec<MediaCard>,
    pub session_id: String,
}

/// How the candidate set was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Topic,
    Interests,
    TopRated,
}

/// The resolved request: what to search for and what to skip
struct Plan {
    terms: Vec<String>,
    kind: Option<MediaKind>,
    /// Item a "more like" request refers to
    reference: Option<MediaItem>,
}

pub struct ChatService {
    media_repo: Arc<dyn MediaRepository>,
    interest_repo: Arc<dyn InterestRepository>,
    chat_repo: Arc<dyn ChatRepository>,
    sessions: ChatSessionTracker,
    config: ChatConfig,
}

impl ChatService {
    pub fn new(
        media_repo: Arc<dyn MediaRepository>,
        interest_repo: Arc<dyn InterestRepository>,
        chat_repo: Arc<dyn ChatRepository>,
        config: ChatConfig,
    ) -> Self {
        let idle = Duration::from_secs(config.session_idle_minutes.max(1) * 60);
        Self {
            media_repo,
            interest_repo,
            chat_repo,
            sessions: ChatSessionTracker::new(idle),
            config,
        }
    }

    /// Answer one chat message
    pub async fn respond(&self, user: &User, request: ChatRequest) -> Result<ChatReply, ChatError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(ChatError::ValidationError("Message cannot be empty".to_string()));
        }
        if message.chars().count() > self.config.max_message_len {
            return Err(ChatError::ValidationError(format!(
                "Message must be at most {} characters",
                self.config.max_message_len
            )));
        }

        let mut session = self.sessions.resolve(user.id, request.session_id.as_deref()).await;
        let parsed = query::parse(message);
        let profile_interests = self.profile_interests(user).await?;
        let age = parsed.age.or_else(|| user.age_on(Utc::now().date_naive()));

        let (reply, cards) = match parsed.intent {
            Intent::Greeting => (greeting(user), Vec::new()),
            Intent::Help => (help_text(), Vec::new()),
            _ => {
                self.recommend(&mut session, &parsed, &profile_interests, age)
                    .await?
            }
        };

        let refs: Vec<RecommendedRef> = cards
            .iter()
            .map(|c| RecommendedRef {
                kind: c.kind,
                id: c.id,
                title: c.title.clone(),
            })
            .collect();

        self.chat_repo
            .append(&NewChatMessage {
                session_id: session.id.clone(),
                user_id: user.id,
                message: message.to_string(),
                reply: reply.clone(),
                items: refs.clone(),
            })
            .await
            .context("Failed to store chat message")?;

        session.remember_shown(refs);
        session.push_turn(
            Turn {
                message: message.to_string(),
                reply: reply.clone(),
            },
            self.config.history_turns,
        );
        let session_id = session.id.clone();
        drop(session);

        tracing::debug!("Chat reply for user {} with {} item(s)", user.id, cards.len());
        Ok(ChatReply {
            reply,
            items: cards,
            session_id,
        })
    }

    /// Persisted turns of one of the user's sessions, oldest first
    pub async fn history(&self, user: &User, session_id: &str) -> Result<Vec<ChatMessage>, ChatError> {
        let messages = self
            .chat_repo
            .history(session_id, user.id)
            .await
            .context("Failed to load chat history")?;
        Ok(messages)
    }

    pub async fn active_sessions(&self) -> u64 {
        self.sessions.count().await
    }

    async fn recommend(
        &self,
        session: &mut ChatSession,
        parsed: &ParsedQuery,
        profile_interests: &[InterestKind],
        age: Option<u32>,
    ) -> Result<(String, Vec<MediaCard>), ChatError> {
        let plan = self.plan(session, parsed).await?;

        let mut interests = parsed.interests.clone();
        if plan.terms.is_empty() {
            for interest in profile_interests {
                if !interests.contains(interest) {
                    interests.push(*interest);
                }
            }
        }

        let mut exclude = session.shown_keys();
        if let Some(ref reference) = plan.reference {
            exclude.insert((reference.kind, reference.id));
        }
        let ctx = RankContext {
            terms: plan.terms.clone(),
            profile_interests: profile_interests.to_vec(),
            mentioned_interests: parsed.interests.clone(),
            age,
            exclude,
            max_items: self.config.max_items,
        };

        // Try the topic first, then interests, then the best-rated catalog
        let mut source = Source::Topic;
        let mut ranked = Vec::new();
        for attempt in [Source::Topic, Source::Interests, Source::TopRated] {
            let candidates = self
                .candidates(attempt, plan.kind, &plan.terms, &interests, &ctx)
                .await?;
            if candidates.is_empty() {
                continue;
            }
            ranked = ranking::rank(&candidates, &ctx);
            if !ranked.is_empty() {
                source = attempt;
                break;
            }
        }

        if !plan.terms.is_empty() || plan.reference.is_some() {
            session.last_terms = plan.terms.clone();
            session.last_kind = plan.kind;
        } else if parsed.intent == Intent::Search {
            session.last_terms.clear();
            session.last_kind = plan.kind;
        }

        let cards: Vec<MediaCard> = ranked.into_iter().map(MediaCard::from).collect();
        let reply = render_reply(parsed, &plan, source, &cards);
        Ok((reply, cards))
    }

    /// Resolve "more" and "more like" against the session
    async fn plan(&self, session: &ChatSession, parsed: &ParsedQuery) -> Result<Plan, ChatError> {
        match parsed.intent {
            Intent::More => Ok(Plan {
                terms: session.last_terms.clone(),
                kind: parsed.kind.or(session.last_kind),
                reference: None,
            }),
            Intent::MoreLike(ref title) => {
                let reference = self.find_reference(session, title).await?;
                let terms = match reference {
                    Some(ref item) => similarity_terms(item),
                    None => query::parse(title).terms,
                };
                Ok(Plan {
                    terms,
                    kind: reference.as_ref().map(|r| r.kind),
                    reference,
                })
            }
            _ => Ok(Plan {
                terms: parsed.terms.clone(),
                kind: parsed.kind,
                reference: None,
            }),
        }
    }

    /// Find the titled item, preferring one already shown in this session
    async fn find_reference(&self, session: &ChatSession, title: &str) -> Result<Option<MediaItem>, ChatError> {
        if let Some(shown) = session.find_shown(title) {
            if let Some(item) = self
                .media_repo
                .get(shown.kind, shown.id)
                .await
                .context("Failed to load referenced media")?
            {
                return Ok(Some(item));
            }
        }

        let needle = title.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }
        for kind in MediaKind::ALL {
            let matches = self
                .media_repo
                .find_candidates(kind, std::slice::from_ref(&needle), self.config.candidate_limit, 0)
                .await
                .context("Failed to look up referenced media")?;
            if let Some(item) = matches.into_iter().find(|m| m.title.to_lowercase() == needle) {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    /// Eligible candidates from `source`, up to `candidate_limit` per kind.
    ///
    /// Rows come back best rated first; pages are read until enough of them
    /// survive the age, availability and already-shown checks or the catalog
    /// runs out.
    async fn candidates(
        &self,
        source: Source,
        kind: Option<MediaKind>,
        terms: &[String],
        interests: &[InterestKind],
        ctx: &RankContext,
    ) -> Result<Vec<MediaItem>, ChatError> {
        let kinds = kind.map(|k| vec![k]).unwrap_or_else(|| MediaKind::ALL.to_vec());
        let words: Vec<String> = match source {
            Source::Topic => terms.to_vec(),
            Source::Interests => interests
                .iter()
                .flat_map(|i| i.keywords().iter().map(|w| w.to_string()))
                .collect(),
            Source::TopRated => Vec::new(),
        };
        if source != Source::TopRated && words.is_empty() {
            return Ok(Vec::new());
        }

        let page = self.config.candidate_limit.max(1);
        let mut all = Vec::new();
        for kind in kinds {
            let mut offset = 0;
            let mut kept = 0;
            loop {
                let batch = match source {
                    Source::TopRated => self.media_repo.top_rated(kind, page, offset).await,
                    _ => {
                        self.media_repo
                            .find_candidates(kind, &words, page, offset)
                            .await
                    }
                }
                .with_context(|| format!("Failed to gather {} candidates", kind))?;
                let fetched = batch.len() as i64;

                for item in batch {
                    // LIKE matches inside words; interests need whole words
                    if source == Source::Interests && !ranking::mentions_any(&item, interests) {
                        continue;
                    }
                    if ranking::is_eligible(&item, ctx) {
                        all.push(item);
                        kept += 1;
                    }
                }

                if fetched < page || kept >= page {
                    break;
                }
                offset += page;
            }
        }
        Ok(all)
    }

    async fn profile_interests(&self, user: &User) -> Result<Vec<InterestKind>, ChatError> {
        let stored = self
            .interest_repo
            .list_for_user(user.id)
            .await
            .context("Failed to load interests")?;
        Ok(stored
            .iter()
            .filter_map(|i| InterestKind::from_str(&i.name).ok())
            .collect())
    }
}

/// Terms describing an item well enough to find its neighbours
fn similarity_terms(item: &MediaItem) -> Vec<String> {
    let mut terms = query::parse(&item.category).terms;
    for term in query::parse(&item.title).terms {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

fn greeting(user: &User) -> String {
    let name = if user.first_name.trim().is_empty() {
        user.username.as_str()
    } else {
        user.first_name.trim()
    };
    format!(
        "Hi {}! I can help you find books and videos. Tell me what you like, for example \"books about dinosaurs\" or \"videos about space\".",
        name
    )
}

fn help_text() -> String {
    "Ask me for books or videos about anything you like, such as \"funny animal stories\" or \"science videos\". \
     Say \"more\" to see other picks, or tap \"More like this\" on a card to find similar ones."
        .to_string()
}

fn kind_phrase(kind: Option<MediaKind>) -> &'static str {
    match kind {
        Some(MediaKind::Book) => "books",
        Some(MediaKind::Video) => "videos",
        None => "books and videos",
    }
}

fn render_reply(parsed: &ParsedQuery, plan: &Plan, source: Source, cards: &[MediaCard]) -> String {
    let what = kind_phrase(plan.kind);
    let topic = plan.terms.join(" ");

    if cards.is_empty() {
        return match (&parsed.intent, topic.is_empty()) {
            (Intent::More, _) | (Intent::MoreLike(_), _) => {
                "I've shown you everything I have on that for now. Try asking about something new!".to_string()
            }
            (_, false) => format!(
                "I couldn't find any {} about {} right now. Try another topic!",
                what, topic
            ),
            (_, true) => "I couldn't find anything to suggest right now. Try asking about a topic you like!".to_string(),
        };
    }

    match (&parsed.intent, source) {
        (Intent::MoreLike(title), Source::Topic) => {
            format!("If you liked \"{}\", you might enjoy these:", title)
        }
        (Intent::More, Source::Topic) if !topic.is_empty() => {
            format!("Here are more {} about {}:", what, topic)
        }
        (_, Source::Topic) if !topic.is_empty() => {
            format!("Here are some {} about {} I think you'll like:", what, topic)
        }
        (_, Source::Topic) | (_, Source::Interests) if topic.is_empty() => {
            format!("Here are some {} picked for your interests:", what)
        }
        (_, Source::Interests) => format!(
            "I couldn't find {} about {}, but here are some picks based on your interests:",
            what, topic
        ),
        (_, Source::TopRated) if topic.is_empty() => {
            format!("Here are some of our top-rated {}:", what)
        }
        (_, Source::TopRated) => format!(
            "I couldn't find {} about {}, but here are some of our top-rated picks:",
            what, topic
        ),
        (_, Source::Topic) => format!("Here are some {} I think you'll like:", what),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxChatRepository, SqlxInterestRepository, SqlxMediaRepository, SqlxUserRepository,
        UserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{MediaStatus, NewMedia, ProfileInput, UserRole};
    use chrono::{Datelike, NaiveDate};

    struct Fixture {
        service: ChatService,
        media: Arc<dyn MediaRepository>,
        child: User,
        pool: DynDatabasePool,
    }

    async fn setup_with(config: ChatConfig) -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let mut parent = User::new("pat".to_string(), "h".to_string(), UserRole::Parent, ProfileInput::default());
        parent.email = Some("pat@example.com".to_string());
        let parent = users.create(&parent).await.unwrap();

        // Seven years old today
        let today = Utc::now().date_naive();
        let birthday = NaiveDate::from_ymd_opt(today.year() - 7, 1, 1).unwrap();
        let mut child = User::new(
            "kim".to_string(),
            "h".to_string(),
            UserRole::Child,
            ProfileInput {
                first_name: "Kim".to_string(),
                last_name: "Kid".to_string(),
                birthday: Some(birthday),
                ..Default::default()
            },
        );
        child.primary_parent_id = Some(parent.id);
        let child = users.create(&child).await.unwrap();

        let media = SqlxMediaRepository::boxed(pool.clone());
        let service = ChatService::new(
            media.clone(),
            SqlxInterestRepository::boxed(pool.clone()),
            SqlxChatRepository::boxed(pool.clone()),
            config,
        );
        Fixture { service, media, child, pool }
    }

    async fn setup() -> Fixture {
        setup_with(ChatConfig::default()).await
    }

    async fn add(f: &Fixture, kind: MediaKind, title: &str, category: &str, age: &str, rating: f64) -> MediaItem {
        let input = NewMedia {
            title: title.to_string(),
            creator: "Someone".to_string(),
            link: format!("https://x/{}/{}", kind, title.replace(' ', "-")),
            age_group: age.to_string(),
            category: category.to_string(),
            description: String::new(),
            rating,
        };
        f.media.create(kind, &input, "lib").await.unwrap()
    }

    fn ask(message: &str, session_id: Option<&str>) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            session_id: session_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_validation() {
        let f = setup().await;
        assert!(matches!(
            f.service.respond(&f.child, ask("   ", None)).await,
            Err(ChatError::ValidationError(_))
        ));
        let long = "a".repeat(ChatConfig::default().max_message_len + 1);
        assert!(matches!(
            f.service.respond(&f.child, ask(&long, None)).await,
            Err(ChatError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_greeting_has_no_items() {
        let f = setup().await;
        let reply = f.service.respond(&f.child, ask("hello", None)).await.unwrap();
        assert!(reply.reply.contains("Kim"));
        assert!(reply.items.is_empty());
        assert!(!reply.session_id.is_empty());
    }

    #[tokio::test]
    async fn test_help_is_not_a_search() {
        let f = setup().await;
        add(&f, MediaKind::Book, "Help the Helpers", "Community", "5-8", 4.5).await;

        let reply = f.service.respond(&f.child, ask("help", None)).await.unwrap();
        assert!(reply.items.is_empty());
        assert_eq!(reply.reply, help_text());
    }

    #[tokio::test]
    async fn test_search_filters_suspended_and_age() {
        let f = setup().await;
        let good = add(&f, MediaKind::Book, "Space Adventures", "Science", "5-8", 4.0).await;
        add(&f, MediaKind::Book, "Space for Teens", "Science", "13-17", 5.0).await;
        let suspended = add(&f, MediaKind::Video, "Space Song", "Music", "3-8", 5.0).await;
        f.media
            .set_status(MediaKind::Video, suspended.id, MediaStatus::Suspended)
            .await
            .unwrap();

        let reply = f.service.respond(&f.child, ask("space please", None)).await.unwrap();

        let ids: Vec<i64> = reply.items.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![good.id]);
        assert!(reply.items[0].badges.contains(&Badge::AgeMatch));
        assert_eq!(reply.items[0].more_like_this, "more like: Space Adventures");
    }

    #[tokio::test]
    async fn test_stated_age_overrides_birthday() {
        let f = setup().await;
        add(&f, MediaKind::Book, "Space for Teens", "Science", "13-17", 5.0).await;

        let reply = f.service.respond(&f.child, ask("I am 14, books about space", None)).await.unwrap();
        assert_eq!(reply.items.len(), 1);
    }

    #[tokio::test]
    async fn test_kind_restricts_results() {
        let f = setup().await;
        add(&f, MediaKind::Book, "Ocean Book", "Animals", "5-8", 4.0).await;
        let video = add(&f, MediaKind::Video, "Ocean Video", "Animals", "5-8", 4.0).await;

        let reply = f.service.respond(&f.child, ask("I want to watch ocean", None)).await.unwrap();
        assert_eq!(reply.items.len(), 1);
        assert_eq!(reply.items[0].id, video.id);
        assert_eq!(reply.items[0].kind, MediaKind::Video);
    }

    #[tokio::test]
    async fn test_more_does_not_repeat_items() {
        let config = ChatConfig {
            max_items: 2,
            ..Default::default()
        };
        let f = setup_with(config).await;
        for i in 0..5 {
            add(&f, MediaKind::Book, &format!("Robot {}", i), "Technology", "5-8", 3.0 + i as f64 * 0.2).await;
        }

        let first = f.service.respond(&f.child, ask("robots", None)).await.unwrap();
        assert_eq!(first.items.len(), 2);
        let session = Some(first.session_id.as_str());

        let second = f.service.respond(&f.child, ask("more", session)).await.unwrap();
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.items.len(), 2);

        let third = f.service.respond(&f.child, ask("more", session)).await.unwrap();
        assert_eq!(third.items.len(), 1);

        let mut seen = std::collections::HashSet::new();
        for card in first.items.iter().chain(&second.items).chain(&third.items) {
            assert!(seen.insert(card.id), "item {} repeated", card.id);
        }

        let fourth = f.service.respond(&f.child, ask("more", session)).await.unwrap();
        assert!(fourth.items.is_empty());
    }

    #[tokio::test]
    async fn test_more_like_excludes_reference() {
        let f = setup().await;
        let dragons = add(&f, MediaKind::Book, "Dragon School", "Fantasy", "5-8", 4.0).await;
        add(&f, MediaKind::Book, "Dragon Riders", "Fantasy", "5-8", 4.2).await;
        add(&f, MediaKind::Book, "Wizard Week", "Fantasy", "5-8", 3.8).await;

        let reply = f
            .service
            .respond(&f.child, ask("more like: Dragon School", None))
            .await
            .unwrap();

        assert!(!reply.items.is_empty());
        assert!(reply.items.iter().all(|c| c.id != dragons.id));
        assert!(reply.reply.contains("Dragon School"));
    }

    #[tokio::test]
    async fn test_falls_back_to_top_rated() {
        let f = setup().await;
        add(&f, MediaKind::Book, "Counting Fun", "Math", "5-8", 4.8).await;

        let reply = f.service.respond(&f.child, ask("zeppelins", None)).await.unwrap();
        assert_eq!(reply.items.len(), 1);
        assert!(reply.reply.contains("top-rated"));
        assert!(reply.items[0].badges.contains(&Badge::TopRated));
    }

    #[tokio::test]
    async fn test_ineligible_top_matches_do_not_hide_others() {
        let config = ChatConfig {
            candidate_limit: 3,
            ..Default::default()
        };
        let f = setup_with(config).await;
        for i in 0..3 {
            add(&f, MediaKind::Book, &format!("Space Teens {}", i), "Science", "13-17", 5.0).await;
        }
        let space_kids = add(&f, MediaKind::Book, "Space Kids", "Science", "5-8", 3.0).await;
        let counting = add(&f, MediaKind::Book, "Counting", "Math", "5-8", 4.9).await;

        let reply = f.service.respond(&f.child, ask("space books", None)).await.unwrap();
        let ids: Vec<i64> = reply.items.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![space_kids.id]);

        let reply = f.service.respond(&f.child, ask("zeppelin books", None)).await.unwrap();
        let ids: Vec<i64> = reply.items.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![counting.id, space_kids.id]);
        assert!(reply.reply.contains("top-rated"));
    }

    #[tokio::test]
    async fn test_more_pages_past_shown_items() {
        let config = ChatConfig {
            max_items: 2,
            candidate_limit: 2,
            ..Default::default()
        };
        let f = setup_with(config).await;
        for i in 0..5 {
            add(&f, MediaKind::Book, &format!("Robot {}", i), "Technology", "5-8", 3.0 + i as f64 * 0.2).await;
        }

        let first = f.service.respond(&f.child, ask("robots", None)).await.unwrap();
        let session = Some(first.session_id.as_str());
        let second = f.service.respond(&f.child, ask("more", session)).await.unwrap();
        let third = f.service.respond(&f.child, ask("more", session)).await.unwrap();

        assert_eq!(
            (first.items.len(), second.items.len(), third.items.len()),
            (2, 2, 1)
        );
        assert!(third.items[0].title.starts_with("Robot"));
    }

    #[tokio::test]
    async fn test_interest_search_ignores_partial_words() {
        let f = setup().await;
        let interests = SqlxInterestRepository::new(f.pool.clone());
        let ids: Vec<i64> = interests
            .list()
            .await
            .unwrap()
            .iter()
            .filter(|i| ["ANIMALS", "COOKING", "SPORTS"].contains(&i.name.as_str()))
            .map(|i| i.id)
            .collect();
        SqlxUserRepository::new(f.pool.clone())
            .update_child(&f.child, Some(ids.as_slice()))
            .await
            .unwrap();

        add(&f, MediaKind::Book, "Education Today", "School", "5-8", 4.9).await;
        let cats = add(&f, MediaKind::Book, "Cat Tales", "Stories", "5-8", 3.0).await;

        let reply = f.service.respond(&f.child, ask("show me something", None)).await.unwrap();
        let ids: Vec<i64> = reply.items.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![cats.id]);
        assert!(reply.items[0].badges.contains(&Badge::InterestMatch));
    }

    #[tokio::test]
    async fn test_profile_interests_drive_empty_topic() {
        let f = setup().await;
        let interests = SqlxInterestRepository::new(f.pool.clone());
        let all = interests.list().await.unwrap();
        let ids: Vec<i64> = all
            .iter()
            .filter(|i| ["COOKING", "ART", "SPORTS"].contains(&i.name.as_str()))
            .map(|i| i.id)
            .collect();
        SqlxUserRepository::new(f.pool.clone())
            .update_child(&f.child, Some(ids.as_slice()))
            .await
            .unwrap();

        let cooking = add(&f, MediaKind::Video, "Baking With Kids", "Cooking", "5-8", 3.0).await;
        add(&f, MediaKind::Video, "Rocks", "Geology", "5-8", 4.9).await;

        let reply = f.service.respond(&f.child, ask("show me something", None)).await.unwrap();
        assert_eq!(reply.items[0].id, cooking.id);
        assert!(reply.items[0].badges.contains(&Badge::InterestMatch));
    }

    #[tokio::test]
    async fn test_history_is_persisted_per_user() {
        let f = setup().await;
        let first = f.service.respond(&f.child, ask("hi", None)).await.unwrap();
        f.service
            .respond(&f.child, ask("help", Some(&first.session_id)))
            .await
            .unwrap();

        let history = f.service.history(&f.child, &first.session_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].message, "hi");

        let users = SqlxUserRepository::new(f.pool.clone());
        let mut other = User::new("sam".to_string(), "h".to_string(), UserRole::Child, ProfileInput::default());
        other.primary_parent_id = f.child.primary_parent_id;
        let other = users.create(&other).await.unwrap();
        assert!(f.service.history(&other, &first.session_id).await.unwrap().is_empty());

        // A foreign session id is not adopted
        let reply = f.service.respond(&other, ask("hi", Some(&first.session_id))).await.unwrap();
        assert_ne!(reply.session_id, first.session_id);
    }
}
