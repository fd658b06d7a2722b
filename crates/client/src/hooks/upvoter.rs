//! Upvoting with per-story in-flight tracking.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use sharerides_core::{Story, StoryId};

use super::lock;
use crate::api::StoriesApi;
use crate::error::ClientError;

/// Sends upvotes, at most one at a time per story.
///
/// Upvotes for different stories proceed independently. The caller's
/// view is only updated through the reconciliation callback, with the
/// story as the server returned it.
pub struct Upvoter {
    api: Arc<dyn StoriesApi>,
    in_flight: Mutex<HashSet<StoryId>>,
}

/// Clears the in-flight mark however the request ends.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<StoryId>>,
    id: StoryId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock(self.set).remove(&self.id);
    }
}

impl Upvoter {
    #[must_use]
    pub fn new(api: Arc<dyn StoriesApi>) -> Self {
        Self {
            api,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Whether an upvote for `id` is outstanding.
    #[must_use]
    pub fn is_upvoting(&self, id: StoryId) -> bool {
        lock(&self.in_flight).contains(&id)
    }

    /// Upvote `id`, handing the updated story to `reconcile` on success.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::UpvoteInFlight` if this story already has an
    /// upvote outstanding, or the server's error (see
    /// [`ClientError::is_already_upvoted`]).
    pub async fn upvote<F>(&self, id: StoryId, reconcile: F) -> Result<Story, ClientError>
    where
        F: FnOnce(&Story) + Send,
    {
        if !lock(&self.in_flight).insert(id) {
            return Err(ClientError::UpvoteInFlight);
        }
        let _guard = InFlight {
            set: &self.in_flight,
            id,
        };

        let story = self.api.upvote_story(id).await?;
        reconcile(&story);
        Ok(story)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use tokio::sync::Notify;

    use super::*;
    use crate::hooks::StoriesFeed;
    use crate::hooks::fake::{FakeApi, story};

    #[tokio::test]
    async fn test_upvote_reconciles_feed() {
        let target = story("ABC123", "a@example.com");
        let api = Arc::new(FakeApi::with(vec![target.clone()]));
        let feed = StoriesFeed::new(Arc::clone(&api) as Arc<dyn StoriesApi>, None);
        feed.refetch().await;

        let upvoter = Upvoter::new(api);
        let updated = upvoter
            .upvote(target.id, |s| feed.replace_story(s.clone()))
            .await
            .unwrap();
        assert_eq!(updated.upvotes, 1);
        assert_eq!(feed.snapshot().stories[0].upvotes, 1);
        assert!(!upvoter.is_upvoting(target.id));
    }

    #[tokio::test]
    async fn test_same_story_is_refused_while_in_flight() {
        let a = story("AAA111", "a@example.com");
        let b = story("BBB222", "b@example.com");
        let api = Arc::new(FakeApi::with(vec![a.clone(), b.clone()]));
        let gate = Arc::new(Notify::new());
        *api.upvote_gate.lock().unwrap() = Some(Arc::clone(&gate));

        let upvoter = Arc::new(Upvoter::new(Arc::clone(&api) as Arc<dyn StoriesApi>));
        let first = tokio::spawn({
            let upvoter = Arc::clone(&upvoter);
            async move { upvoter.upvote(a.id, |_| {}).await }
        });
        tokio::task::yield_now().await;
        assert!(upvoter.is_upvoting(a.id));

        let second = upvoter.upvote(a.id, |_| {}).await;
        assert!(matches!(second, Err(ClientError::UpvoteInFlight)));

        // A different story is not blocked by the outstanding one.
        *api.upvote_gate.lock().unwrap() = None;
        let calls = AtomicU64::new(0);
        upvoter
            .upvote(b.id, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        gate.notify_one();
        assert_eq!(first.await.unwrap().unwrap().upvotes, 1);
        assert!(!upvoter.is_upvoting(a.id));
        assert_eq!(api.voters.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_clears_in_flight_and_skips_reconcile() {
        let target = story("ABC123", "a@example.com");
        let api = Arc::new(FakeApi::with(vec![target.clone()]));
        *api.fail_network.lock().unwrap() = true;
        let upvoter = Upvoter::new(api);

        let err = upvoter
            .upvote(target.id, |_| panic!("reconciled on failure"))
            .await
            .unwrap_err();
        assert!(err.is_network());
        assert!(!upvoter.is_upvoting(target.id));
    }
}
