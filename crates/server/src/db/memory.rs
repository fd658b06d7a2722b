//! In-memory story and identity store.
//!
//! Used when `SHARERIDES_STORE=memory` and throughout the tests. All state
//! sits behind one lock per collection; no lock is held across an await.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use sharerides_core::{Email, StoryId, UserId, ValidStory};

use super::{IdentityStore, Page, RepositoryError, StoryFilter, StoryStore, UpvoteOutcome};
use crate::models::{NewStory, StoryRecord, User, VerificationToken};

/// Process-local store implementing [`StoryStore`] and [`IdentityStore`].
#[derive(Default)]
pub struct InMemoryStore {
    /// Insertion order, which is also creation order.
    stories: Mutex<Vec<StoryRecord>>,
    users: Mutex<HashMap<Email, User>>,
    tokens: Mutex<Vec<VerificationToken>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed record, bypassing the usual defaults.
    ///
    /// Lets tests and the seeder load legacy-shaped documents.
    pub fn insert_record(&self, record: StoryRecord) {
        lock(&self.stories).push(record);
    }
}

#[async_trait]
impl StoryStore for InMemoryStore {
    async fn list(
        &self,
        filter: &StoryFilter,
        page: Page,
    ) -> Result<(Vec<StoryRecord>, u64), RepositoryError> {
        let stories = lock(&self.stories);
        let matching: Vec<&StoryRecord> = stories
            .iter()
            .rev()
            .filter(|s| {
                filter
                    .plate_number
                    .as_ref()
                    .is_none_or(|plate| &s.plate_number == plate)
            })
            .collect();

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.skip as usize)
            .take(page.limit.map_or(usize::MAX, |limit| limit as usize))
            .cloned()
            .collect();

        Ok((items, total))
    }

    async fn get(&self, id: StoryId) -> Result<Option<StoryRecord>, RepositoryError> {
        Ok(lock(&self.stories).iter().find(|s| s.id == id).cloned())
    }

    async fn insert(&self, new: NewStory) -> Result<StoryRecord, RepositoryError> {
        let record = new.into_record(StoryId::generate(), Utc::now());
        lock(&self.stories).push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        id: StoryId,
        patch: &ValidStory,
    ) -> Result<Option<StoryRecord>, RepositoryError> {
        let mut stories = lock(&self.stories);
        Ok(stories.iter_mut().find(|s| s.id == id).map(|story| {
            story.apply(patch, Utc::now());
            story.clone()
        }))
    }

    async fn delete(&self, id: StoryId) -> Result<bool, RepositoryError> {
        let mut stories = lock(&self.stories);
        let before = stories.len();
        stories.retain(|s| s.id != id);
        Ok(stories.len() < before)
    }

    async fn upvote(&self, id: StoryId, voter: &Email) -> Result<UpvoteOutcome, RepositoryError> {
        let mut stories = lock(&self.stories);
        let Some(story) = stories.iter_mut().find(|s| s.id == id) else {
            return Ok(UpvoteOutcome::NotFound);
        };
        if story.has_upvoted(voter) {
            return Ok(UpvoteOutcome::AlreadyUpvoted);
        }
        story.upvotes += 1;
        story.upvoted_by.push(voter.clone());
        story.updated_at = Utc::now();
        Ok(UpvoteOutcome::Upvoted(story.clone()))
    }

    async fn list_by_owner(&self, email: &Email) -> Result<Vec<StoryRecord>, RepositoryError> {
        Ok(lock(&self.stories)
            .iter()
            .rev()
            .filter(|s| &s.user_email == email)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        Ok(lock(&self.users).get(email).cloned())
    }

    async fn create_verified_user(&self, email: &Email) -> Result<User, RepositoryError> {
        let mut users = lock(&self.users);
        if users.contains_key(email) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        let now = Utc::now();
        let user = User {
            id: UserId::generate(),
            email: email.clone(),
            name: None,
            image: None,
            email_verified: Some(now),
            created_at: now,
            updated_at: now,
        };
        users.insert(email.clone(), user.clone());
        Ok(user)
    }

    async fn mark_email_verified(&self, user: &User) -> Result<User, RepositoryError> {
        let mut users = lock(&self.users);
        let stored = users
            .get_mut(&user.email)
            .ok_or(RepositoryError::NotFound)?;
        let now = Utc::now();
        stored.email_verified.get_or_insert(now);
        stored.updated_at = now;
        Ok(stored.clone())
    }

    async fn store_verification_token(
        &self,
        token: &VerificationToken,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now();
        let mut tokens = lock(&self.tokens);
        tokens.retain(|t| !t.is_expired(now));
        tokens.push(token.clone());
        Ok(())
    }

    async fn take_verification_token(
        &self,
        identifier: &Email,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>, RepositoryError> {
        let mut tokens = lock(&self.tokens);
        let position = tokens
            .iter()
            .position(|t| &t.identifier == identifier && t.token_hash == token_hash);
        Ok(position.map(|i| tokens.swap_remove(i)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use sharerides_core::{PlateNumber, Rating, StoryInput};

    use super::*;
    use crate::models::CurrentUser;

    fn owner(email: &str) -> CurrentUser {
        CurrentUser {
            id: UserId::generate(),
            email: Email::parse(email).unwrap(),
        }
    }

    fn new_story(plate: &str, owner: &CurrentUser) -> NewStory {
        NewStory {
            content: StoryInput::new(plate, "Smooth ride", Rating::Positive)
                .validate()
                .unwrap(),
            owner: owner.clone(),
        }
    }

    #[tokio::test]
    async fn test_list_newest_first_with_total() {
        let store = InMemoryStore::new();
        let alice = owner("alice@example.com");
        let a = store.insert(new_story("AAA-1", &alice)).await.unwrap();
        let _other = store.insert(new_story("BBB-2", &alice)).await.unwrap();
        let b = store.insert(new_story("aaa-1", &alice)).await.unwrap();

        let filter = StoryFilter {
            plate_number: Some(PlateNumber::parse("AAA-1").unwrap()),
        };
        let (items, total) = store.list(&filter, Page::new(1, 0)).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.iter().map(|s| s.id).collect::<Vec<_>>(), vec![b.id]);

        let (items, _) = store.list(&filter, Page::new(10, 1)).await.unwrap();
        assert_eq!(items.iter().map(|s| s.id).collect::<Vec<_>>(), vec![a.id]);

        let (all, total) = store.list(&StoryFilter::default(), Page::default()).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_upvote_outcomes() {
        let store = InMemoryStore::new();
        let alice = owner("alice@example.com");
        let story = store.insert(new_story("CCC-3", &alice)).await.unwrap();

        let outcome = store.upvote(story.id, &alice.email).await.unwrap();
        assert!(matches!(outcome, UpvoteOutcome::Upvoted(ref s) if s.upvotes == 1));
        assert_eq!(
            store.upvote(story.id, &alice.email).await.unwrap(),
            UpvoteOutcome::AlreadyUpvoted
        );
        assert_eq!(
            store.upvote(StoryId::generate(), &alice.email).await.unwrap(),
            UpvoteOutcome::NotFound
        );
        assert_eq!(store.get(story.id).await.unwrap().unwrap().upvotes, 1);
    }

    #[tokio::test]
    async fn test_legacy_record_accepts_new_votes() {
        let store = InMemoryStore::new();
        let alice = owner("alice@example.com");
        let mut legacy = new_story("OLD-1", &alice).into_record(StoryId::generate(), Utc::now());
        legacy.upvotes = 3;
        store.insert_record(legacy.clone());

        let voter = Email::parse("bob@example.com").unwrap();
        let UpvoteOutcome::Upvoted(after) = store.upvote(legacy.id, &voter).await.unwrap() else {
            panic!("expected vote to count");
        };
        assert_eq!(after.upvotes, 4);
        assert_eq!(after.upvoted_by, vec![voter]);
    }

    #[tokio::test]
    async fn test_concurrent_distinct_voters_all_count() {
        let store = Arc::new(InMemoryStore::new());
        let alice = owner("alice@example.com");
        let story = store.insert(new_story("DDD-4", &alice)).await.unwrap();

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let voter = Email::parse(&format!("voter{i}@example.com")).unwrap();
                    store.upvote(story.id, &voter).await.unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert!(matches!(handle.await.unwrap(), UpvoteOutcome::Upvoted(_)));
        }

        let stored = store.get(story.id).await.unwrap().unwrap();
        assert_eq!(stored.upvotes, 32);
        assert_eq!(stored.upvoted_by.len(), 32);
    }

    #[tokio::test]
    async fn test_delete_and_owner_listing() {
        let store = InMemoryStore::new();
        let alice = owner("alice@example.com");
        let bob = owner("bob@example.com");
        let first = store.insert(new_story("EEE-5", &alice)).await.unwrap();
        let _bobs = store.insert(new_story("EEE-5", &bob)).await.unwrap();
        let second = store.insert(new_story("FFF-6", &alice)).await.unwrap();

        let mine = store.list_by_owner(&alice.email).await.unwrap();
        assert_eq!(
            mine.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );

        assert!(store.delete(first.id).await.unwrap());
        assert!(!store.delete(first.id).await.unwrap());
        assert!(store.get(first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tokens_are_single_use() {
        let store = InMemoryStore::new();
        let email = Email::parse("rider@example.com").unwrap();
        let token = VerificationToken {
            identifier: email.clone(),
            token_hash: "cd".repeat(32),
            expires_at: Utc::now(),
        };
        store.store_verification_token(&token).await.unwrap();

        assert_eq!(
            store.take_verification_token(&email, &token.token_hash).await.unwrap(),
            Some(token.clone())
        );
        assert!(
            store
                .take_verification_token(&email, &token.token_hash)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_storing_a_token_purges_expired_ones() {
        let store = InMemoryStore::new();
        let email = Email::parse("rider@example.com").unwrap();
        for n in 0..1000 {
            let expired = VerificationToken {
                identifier: email.clone(),
                token_hash: format!("{n:064x}"),
                expires_at: Utc::now() - chrono::Duration::minutes(1),
            };
            lock(&store.tokens).push(expired);
        }

        let fresh = VerificationToken {
            identifier: email.clone(),
            token_hash: "ef".repeat(32),
            expires_at: Utc::now() + chrono::Duration::hours(24),
        };
        store.store_verification_token(&fresh).await.unwrap();

        assert_eq!(lock(&store.tokens).as_slice(), [fresh]);
    }

    #[tokio::test]
    async fn test_duplicate_user_conflicts() {
        let store = InMemoryStore::new();
        let email = Email::parse("rider@example.com").unwrap();
        store.create_verified_user(&email).await.unwrap();
        assert!(matches!(
            store.create_verified_user(&email).await,
            Err(RepositoryError::Conflict(_))
        ));
    }
}
