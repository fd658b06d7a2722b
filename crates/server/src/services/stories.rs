//! Story business rules.
//!
//! Route handlers delegate here. Validation and authorization always run
//! before the store is asked to change anything.

use thiserror::Error;
use tracing::instrument;

use sharerides_core::{PlateNumber, Story, StoryId, StoryInput, ValidationError};

use crate::db::{Page, RepositoryError, StoryFilter, StoryStore, UpvoteOutcome};
use crate::models::{CurrentUser, NewStory, StoryRecord};

/// Owner-only actions, for the 403 message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerAction {
    Edit,
    Delete,
}

impl OwnerAction {
    const fn verb(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

/// Errors from story operations.
#[derive(Debug, Error)]
pub enum StoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Story not found")]
    NotFound,

    #[error("Unauthorized - you can only {} your own stories", .0.verb())]
    Forbidden(OwnerAction),

    #[error("You have already upvoted this story")]
    AlreadyUpvoted,

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Whether `caller` owns `story`.
///
/// Ownership is decided by email, the identity every story records.
#[must_use]
pub fn is_owner(story: &StoryRecord, caller: &CurrentUser) -> bool {
    story.user_email == caller.email
}

/// Story service over a [`StoryStore`].
pub struct StoryService<'a> {
    store: &'a dyn StoryStore,
}

impl<'a> StoryService<'a> {
    /// Create a new story service.
    #[must_use]
    pub const fn new(store: &'a dyn StoryStore) -> Self {
        Self { store }
    }

    /// List stories, newest first, optionally for one plate.
    ///
    /// A blank plate lists everything. A plate too long to be valid matches
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::Repository` if the store fails.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        plate: Option<&str>,
        page: Page,
    ) -> Result<(Vec<Story>, u64), StoryError> {
        let plate = plate.map(str::trim).filter(|p| !p.is_empty());
        let filter = match plate.map(PlateNumber::parse) {
            None => StoryFilter::default(),
            Some(Ok(plate_number)) => StoryFilter {
                plate_number: Some(plate_number),
            },
            Some(Err(_)) => return Ok((Vec::new(), 0)),
        };

        let (records, total) = self.store.list(&filter, page).await?;
        Ok((records.into_iter().map(Story::from).collect(), total))
    }

    /// Fetch one story.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::NotFound` if no story has this id.
    #[instrument(skip(self), fields(story_id = %id))]
    pub async fn get(&self, id: StoryId) -> Result<Story, StoryError> {
        self.store
            .get(id)
            .await?
            .map(Story::from)
            .ok_or(StoryError::NotFound)
    }

    /// Create a story owned by `caller`.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::Validation` if the input is invalid.
    #[instrument(skip(self, input, caller), fields(email = %caller.email))]
    pub async fn create(
        &self,
        input: &StoryInput,
        caller: &CurrentUser,
    ) -> Result<Story, StoryError> {
        let content = input.validate()?;
        let record = self
            .store
            .insert(NewStory {
                content,
                owner: caller.clone(),
            })
            .await?;

        tracing::info!(story_id = %record.id, plate = %record.plate_number, "Story created");
        Ok(record.into())
    }

    /// Replace the content of a story owned by `caller`.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::Validation`, `StoryError::NotFound`, or
    /// `StoryError::Forbidden` if `caller` is not the owner.
    #[instrument(skip(self, input, caller), fields(story_id = %id, email = %caller.email))]
    pub async fn update(
        &self,
        id: StoryId,
        input: &StoryInput,
        caller: &CurrentUser,
    ) -> Result<Story, StoryError> {
        let patch = input.validate()?;
        self.owned_story(id, caller, OwnerAction::Edit).await?;

        self.store
            .update(id, &patch)
            .await?
            .map(Story::from)
            .ok_or(StoryError::NotFound)
    }

    /// Delete a story owned by `caller`.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::NotFound` or `StoryError::Forbidden`.
    #[instrument(skip(self, caller), fields(story_id = %id, email = %caller.email))]
    pub async fn delete(&self, id: StoryId, caller: &CurrentUser) -> Result<(), StoryError> {
        self.owned_story(id, caller, OwnerAction::Delete).await?;

        if !self.store.delete(id).await? {
            return Err(StoryError::NotFound);
        }
        tracing::info!("Story deleted");
        Ok(())
    }

    /// Count one upvote from `caller`. Owners may upvote their own stories.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::NotFound` or `StoryError::AlreadyUpvoted`.
    #[instrument(skip(self, caller), fields(story_id = %id, email = %caller.email))]
    pub async fn upvote(&self, id: StoryId, caller: &CurrentUser) -> Result<Story, StoryError> {
        match self.store.upvote(id, &caller.email).await? {
            UpvoteOutcome::Upvoted(record) => Ok(record.into()),
            UpvoteOutcome::AlreadyUpvoted => Err(StoryError::AlreadyUpvoted),
            UpvoteOutcome::NotFound => Err(StoryError::NotFound),
        }
    }

    /// All of `caller`'s stories, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoryError::Repository` if the store fails.
    #[instrument(skip(self, caller), fields(email = %caller.email))]
    pub async fn list_mine(&self, caller: &CurrentUser) -> Result<Vec<Story>, StoryError> {
        let records = self.store.list_by_owner(&caller.email).await?;
        Ok(records.into_iter().map(Story::from).collect())
    }

    async fn owned_story(
        &self,
        id: StoryId,
        caller: &CurrentUser,
        action: OwnerAction,
    ) -> Result<StoryRecord, StoryError> {
        let story = self.store.get(id).await?.ok_or(StoryError::NotFound)?;
        if !is_owner(&story, caller) {
            tracing::warn!(owner = %story.user_email, "Ownership check failed");
            return Err(StoryError::Forbidden(action));
        }
        Ok(story)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sharerides_core::{Email, Rating, UserId};

    use super::*;
    use crate::db::InMemoryStore;

    fn user(email: &str) -> CurrentUser {
        CurrentUser {
            id: UserId::generate(),
            email: Email::parse(email).unwrap(),
        }
    }

    fn input(plate: &str, story: &str) -> StoryInput {
        StoryInput::new(plate, story, Rating::Positive)
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = InMemoryStore::new();
        let service = StoryService::new(&store);
        let alice = user("alice@example.com");

        let created = service
            .create(&input("gr-1234-24", "Great driver").with_location("Athens"), &alice)
            .await
            .unwrap();
        assert_eq!(created.plate_number.as_str(), "GR-1234-24");
        assert_eq!(created.upvotes, 0);
        assert_eq!(created.user_email, alice.email);

        let fetched = service.get(created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_invalid_create_is_not_persisted() {
        let store = InMemoryStore::new();
        let service = StoryService::new(&store);
        let alice = user("alice@example.com");

        let err = service
            .create(&input("ABC", &"x".repeat(501)), &alice)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoryError::Validation(ValidationError::StoryTooLong)
        ));

        let (items, total) = service.list(None, Page::default()).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_non_owner_cannot_edit_or_delete() {
        let store = InMemoryStore::new();
        let service = StoryService::new(&store);
        let alice = user("alice@example.com");
        let mallory = user("mallory@example.com");
        let story = service.create(&input("ABC", "Original"), &alice).await.unwrap();

        let err = service
            .update(story.id, &input("ABC", "Hijacked"), &mallory)
            .await
            .unwrap_err();
        assert!(matches!(err, StoryError::Forbidden(OwnerAction::Edit)));
        assert_eq!(
            err.to_string(),
            "Unauthorized - you can only edit your own stories"
        );

        let err = service.delete(story.id, &mallory).await.unwrap_err();
        assert!(matches!(err, StoryError::Forbidden(OwnerAction::Delete)));

        assert_eq!(service.get(story.id).await.unwrap().story, "Original");
    }

    #[tokio::test]
    async fn test_update_validates_before_lookup() {
        let store = InMemoryStore::new();
        let service = StoryService::new(&store);
        let alice = user("alice@example.com");

        let mut bad = input("ABC", "fine");
        bad.rating = Some("great".to_owned());
        let err = service
            .update(StoryId::generate(), &bad, &alice)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoryError::Validation(ValidationError::InvalidRating)
        ));
    }

    #[tokio::test]
    async fn test_owner_update_and_delete() {
        let store = InMemoryStore::new();
        let service = StoryService::new(&store);
        let alice = user("alice@example.com");
        let story = service.create(&input("ABC", "Original"), &alice).await.unwrap();

        let updated = service
            .update(story.id, &input("xyz", "Edited"), &alice)
            .await
            .unwrap();
        assert_eq!(updated.plate_number.as_str(), "XYZ");
        assert_eq!(updated.timestamp, story.timestamp);

        service.delete(story.id, &alice).await.unwrap();
        assert!(matches!(
            service.get(story.id).await,
            Err(StoryError::NotFound)
        ));
        assert!(matches!(
            service.delete(story.id, &alice).await,
            Err(StoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_double_upvote_counts_once() {
        let store = InMemoryStore::new();
        let service = StoryService::new(&store);
        let alice = user("alice@example.com");
        let bob = user("bob@example.com");
        let story = service.create(&input("ABC", "Kind"), &alice).await.unwrap();

        assert_eq!(service.upvote(story.id, &bob).await.unwrap().upvotes, 1);
        assert!(matches!(
            service.upvote(story.id, &bob).await,
            Err(StoryError::AlreadyUpvoted)
        ));
        // Owners are not excluded from voting.
        assert_eq!(service.upvote(story.id, &alice).await.unwrap().upvotes, 2);
    }

    #[tokio::test]
    async fn test_list_blank_and_overlong_plates() {
        let store = InMemoryStore::new();
        let service = StoryService::new(&store);
        let alice = user("alice@example.com");
        service.create(&input("ABC", "One"), &alice).await.unwrap();

        let (_, total) = service.list(Some("  "), Page::default()).await.unwrap();
        assert_eq!(total, 1);

        let long = "A".repeat(PlateNumber::MAX_LENGTH + 1);
        let (items, total) = service.list(Some(&long), Page::default()).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 0);

        let (items, _) = service.list(Some("abc"), Page::default()).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_list_honours_large_and_zero_limits() {
        let store = InMemoryStore::new();
        let service = StoryService::new(&store);
        let alice = user("alice@example.com");
        for n in 0..120 {
            service
                .create(&input("ABC", &format!("Ride {n}")), &alice)
                .await
                .unwrap();
        }

        let (items, total) = service.list(None, Page::new(150, 0)).await.unwrap();
        assert_eq!(items.len(), 120);
        assert_eq!(total, 120);

        let (items, _) = service.list(None, Page::new(0, 0)).await.unwrap();
        assert_eq!(items.len(), 120);

        let (items, _) = service.list(None, Page::new(0, 115)).await.unwrap();
        assert_eq!(items.len(), 5);
    }

    #[tokio::test]
    async fn test_list_mine_only_returns_callers_stories() {
        let store = InMemoryStore::new();
        let service = StoryService::new(&store);
        let alice = user("alice@example.com");
        let bob = user("bob@example.com");
        service.create(&input("A1", "a"), &alice).await.unwrap();
        service.create(&input("B1", "b"), &bob).await.unwrap();
        let newest = service.create(&input("A2", "c"), &alice).await.unwrap();

        let mine = service.list_mine(&alice).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine.first().unwrap().id, newest.id);
    }
}
