//! Catalog service
//!
//! Public browsing of books and videos plus curation by approved librarians.

use crate::cache::{self, keys, Cache};
use crate::db::repositories::MediaRepository;
use crate::models::{MediaItem, MediaKind, MediaPatch, MediaQuery, NewMedia, Paged, User};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{0}")]
    ValidationError(String),

    /// Link already used by another book or video
    #[error("This link is already in use by the {kind} titled: '{title}'")]
    DuplicateLink { kind: MediaKind, title: String },

    #[error("{} not found", .0.label())]
    NotFound(MediaKind),

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CatalogService {
    media_repo: Arc<dyn MediaRepository>,
    cache: Arc<Cache>,
}

impl CatalogService {
    pub fn new(media_repo: Arc<dyn MediaRepository>, cache: Arc<Cache>) -> Self {
        Self { media_repo, cache }
    }

    /// Paginated listing, newest first
    pub async fn list(&self, kind: MediaKind, query: &MediaQuery) -> Result<Paged<MediaItem>, CatalogError> {
        let page = self
            .media_repo
            .search(kind, query)
            .await
            .with_context(|| format!("Failed to list {}s", kind))?;
        Ok(page)
    }

    /// Media a given librarian added, for the admin dashboard
    pub async fn list_by_librarian(
        &self,
        kind: MediaKind,
        librarian: &User,
        page: Option<i64>,
        size: Option<i64>,
    ) -> Result<Paged<MediaItem>, CatalogError> {
        let query = MediaQuery {
            search: None,
            source: Some(librarian.username.clone()),
            page,
            size,
        };
        self.list(kind, &query).await
    }

    /// Sorted distinct sources across books and videos
    pub async fn sources(&self) -> Result<Vec<String>, CatalogError> {
        cache::get_or_load(&self.cache, keys::MEDIA_SOURCES, || async {
            self.media_repo
                .sources()
                .await
                .context("Failed to list media sources")
                .map_err(CatalogError::from)
        })
        .await
    }

    pub async fn get(&self, kind: MediaKind, id: i64) -> Result<MediaItem, CatalogError> {
        self.media_repo
            .get(kind, id)
            .await
            .context("Failed to get media")?
            .ok_or(CatalogError::NotFound(kind))
    }

    /// Add an entry; its source is the librarian's username
    pub async fn add(&self, librarian: &User, kind: MediaKind, input: NewMedia) -> Result<MediaItem, CatalogError> {
        ensure_curator(librarian)?;

        let input = NewMedia {
            title: input.title.trim().to_string(),
            creator: input.creator.trim().to_string(),
            link: input.link.trim().to_string(),
            ..input
        };
        validate_required("Title", &input.title)?;
        validate_required(creator_label(kind), &input.creator)?;
        validate_required("Link", &input.link)?;
        validate_rating(input.rating)?;

        self.check_link(&input.link, None).await?;

        let item = self
            .media_repo
            .create(kind, &input, &librarian.username)
            .await
            .context("Failed to add media")?;

        cache::invalidate(&self.cache, keys::MEDIA_SOURCES).await;
        tracing::info!("Librarian '{}' added {} {} '{}'", librarian.username, kind, item.id, item.title);
        Ok(item)
    }

    /// Apply the provided fields; untouched fields keep their values
    pub async fn edit(
        &self,
        librarian: &User,
        kind: MediaKind,
        id: i64,
        patch: MediaPatch,
    ) -> Result<MediaItem, CatalogError> {
        ensure_curator(librarian)?;
        let mut item = self.get(kind, id).await?;

        if let Some(ref title) = patch.title {
            validate_required("Title", title)?;
        }
        if let Some(ref creator) = patch.creator {
            validate_required(creator_label(kind), creator)?;
        }
        if let Some(rating) = patch.rating {
            validate_rating(rating)?;
        }
        if let Some(ref link) = patch.link {
            validate_required("Link", link)?;
            if link.trim() != item.link {
                self.check_link(link.trim(), Some((kind, id))).await?;
            }
        }

        patch.apply(&mut item);
        item.link = item.link.trim().to_string();

        self.media_repo
            .update(&item)
            .await
            .context("Failed to update media")?;
        Ok(item)
    }

    pub async fn delete(&self, librarian: &User, kind: MediaKind, id: i64) -> Result<(), CatalogError> {
        ensure_curator(librarian)?;
        let deleted = self
            .media_repo
            .delete(kind, id)
            .await
            .context("Failed to delete media")?;
        if !deleted {
            return Err(CatalogError::NotFound(kind));
        }

        cache::invalidate(&self.cache, keys::MEDIA_SOURCES).await;
        tracing::info!("Librarian '{}' deleted {} {}", librarian.username, kind, id);
        Ok(())
    }

    /// Flip between available and suspended
    pub async fn toggle_suspended(&self, librarian: &User, kind: MediaKind, id: i64) -> Result<MediaItem, CatalogError> {
        ensure_curator(librarian)?;
        let mut item = self.get(kind, id).await?;
        item.status = item.status.toggled();

        self.media_repo
            .set_status(kind, id, item.status)
            .await
            .context("Failed to update media status")?;
        Ok(item)
    }

    pub async fn count(&self, kind: MediaKind) -> Result<i64, CatalogError> {
        let count = self.media_repo.count(kind).await.context("Failed to count media")?;
        Ok(count)
    }

    async fn check_link(&self, link: &str, except: Option<(MediaKind, i64)>) -> Result<(), CatalogError> {
        let existing = self
            .media_repo
            .find_by_link(link)
            .await
            .context("Failed to check link")?;

        match existing {
            Some(item) if Some((item.kind, item.id)) != except => Err(CatalogError::DuplicateLink {
                kind: item.kind,
                title: item.title,
            }),
            _ => Ok(()),
        }
    }
}

fn ensure_curator(user: &User) -> Result<(), CatalogError> {
    if !user.can_curate() {
        return Err(CatalogError::Forbidden(
            "Only approved librarians can manage the catalog".to_string(),
        ));
    }
    Ok(())
}

fn creator_label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Book => "Author",
        MediaKind::Video => "Creator",
    }
}

fn validate_required(field: &str, value: &str) -> Result<(), CatalogError> {
    if value.trim().is_empty() {
        return Err(CatalogError::ValidationError(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_rating(rating: f64) -> Result<(), CatalogError> {
    if !(0.0..=5.0).contains(&rating) {
        return Err(CatalogError::ValidationError(
            "Rating must be between 0 and 5".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::SqlxMediaRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::{MediaStatus, ProfileInput, UserRole};

    async fn setup() -> CatalogService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        CatalogService::new(
            SqlxMediaRepository::boxed(pool),
            create_cache(&CacheConfig::default()),
        )
    }

    fn librarian(name: &str, approved: bool) -> User {
        let mut user = User::new(name.to_string(), "hash".to_string(), UserRole::Librarian, ProfileInput::default());
        user.id = 1;
        user.is_approved = approved;
        user
    }

    fn book(title: &str, link: &str) -> NewMedia {
        NewMedia {
            title: title.to_string(),
            creator: "Someone".to_string(),
            link: link.to_string(),
            age_group: "5-8".to_string(),
            category: "Science".to_string(),
            description: "A book".to_string(),
            rating: 4.0,
        }
    }

    #[tokio::test]
    async fn test_add_sets_source_and_rejects_duplicate_links() {
        let service = setup().await;
        let lib = librarian("alice", true);

        let item = service
            .add(&lib, MediaKind::Book, book("Stars", "https://x/stars"))
            .await
            .unwrap();
        assert_eq!(item.source, "alice");

        let err = service
            .add(&lib, MediaKind::Video, book("Stars again", " https://x/stars "))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "This link is already in use by the book titled: 'Stars'"
        );
    }

    #[tokio::test]
    async fn test_unapproved_librarian_cannot_curate() {
        let service = setup().await;
        let result = service
            .add(&librarian("bob", false), MediaKind::Book, book("A", "https://x/a"))
            .await;
        assert!(matches!(result, Err(CatalogError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_add_validation() {
        let service = setup().await;
        let lib = librarian("alice", true);

        let mut no_title = book("", "https://x/a");
        no_title.title = "  ".to_string();
        assert!(matches!(
            service.add(&lib, MediaKind::Book, no_title).await,
            Err(CatalogError::ValidationError(_))
        ));

        let mut bad_rating = book("A", "https://x/a");
        bad_rating.rating = 7.5;
        assert!(matches!(
            service.add(&lib, MediaKind::Book, bad_rating).await,
            Err(CatalogError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_edit_changes_only_given_fields() {
        let service = setup().await;
        let lib = librarian("alice", true);
        let item = service.add(&lib, MediaKind::Book, book("A", "https://x/a")).await.unwrap();
        service.add(&lib, MediaKind::Book, book("B", "https://x/b")).await.unwrap();

        let patch = MediaPatch {
            title: Some("A, revised".to_string()),
            ..Default::default()
        };
        let edited = service.edit(&lib, MediaKind::Book, item.id, patch).await.unwrap();
        assert_eq!(edited.title, "A, revised");
        assert_eq!(edited.category, "Science");

        // Keeping its own link is fine, taking another entry's is not
        let same_link = MediaPatch {
            link: Some("https://x/a".to_string()),
            ..Default::default()
        };
        assert!(service.edit(&lib, MediaKind::Book, item.id, same_link).await.is_ok());

        let taken = MediaPatch {
            link: Some("https://x/b".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.edit(&lib, MediaKind::Book, item.id, taken).await,
            Err(CatalogError::DuplicateLink { .. })
        ));

        let missing = service.edit(&lib, MediaKind::Book, 999, MediaPatch::default()).await;
        assert!(matches!(missing, Err(CatalogError::NotFound(MediaKind::Book))));
    }

    #[tokio::test]
    async fn test_toggle_and_delete() {
        let service = setup().await;
        let lib = librarian("alice", true);
        let item = service.add(&lib, MediaKind::Video, book("V", "https://x/v")).await.unwrap();

        let toggled = service.toggle_suspended(&lib, MediaKind::Video, item.id).await.unwrap();
        assert_eq!(toggled.status, MediaStatus::Suspended);
        let toggled = service.toggle_suspended(&lib, MediaKind::Video, item.id).await.unwrap();
        assert_eq!(toggled.status, MediaStatus::Available);

        service.delete(&lib, MediaKind::Video, item.id).await.unwrap();
        assert!(matches!(
            service.delete(&lib, MediaKind::Video, item.id).await,
            Err(CatalogError::NotFound(MediaKind::Video))
        ));
    }

    #[tokio::test]
    async fn test_sources_cache_invalidated_on_add() {
        let service = setup().await;
        assert!(service.sources().await.unwrap().is_empty());

        service
            .add(&librarian("zed", true), MediaKind::Book, book("Z", "https://x/z"))
            .await
            .unwrap();
        service
            .add(&librarian("amy", true), MediaKind::Video, book("Y", "https://x/y"))
            .await
            .unwrap();

        assert_eq!(service.sources().await.unwrap(), vec!["amy", "zed"]);
    }

    #[tokio::test]
    async fn test_list_by_librarian() {
        let service = setup().await;
        let alice = librarian("alice", true);
        service.add(&alice, MediaKind::Book, book("A", "https://x/a")).await.unwrap();
        service.add(&librarian("bob", true), MediaKind::Book, book("B", "https://x/b")).await.unwrap();

        let page = service
            .list_by_librarian(MediaKind::Book, &alice, None, None)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].title, "A");
    }
}
