//! The signed-in user's own stories.

use std::sync::{Arc, Mutex};

use sharerides_core::{Story, StoryId, StoryInput};

use super::lock;
use crate::api::StoriesApi;
use crate::error::ClientError;

/// Point-in-time view of [`UserStories`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserStoriesSnapshot {
    pub loading: bool,
    pub error: Option<String>,
    pub stories: Vec<Story>,
}

/// The caller's stories with edit and delete.
///
/// The local list changes only after the server confirms the action.
pub struct UserStories {
    api: Arc<dyn StoriesApi>,
    state: Mutex<UserStoriesSnapshot>,
}

impl UserStories {
    #[must_use]
    pub fn new(api: Arc<dyn StoriesApi>) -> Self {
        Self {
            api,
            state: Mutex::new(UserStoriesSnapshot::default()),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> UserStoriesSnapshot {
        lock(&self.state).clone()
    }

    /// Load the caller's stories.
    pub async fn fetch(&self) {
        {
            let mut state = lock(&self.state);
            state.loading = true;
            state.error = None;
        }

        let result = self.api.my_stories().await;

        let mut state = lock(&self.state);
        state.loading = false;
        match result {
            Ok(stories) => state.stories = stories,
            Err(e) => state.error = Some(e.to_string()),
        }
    }

    /// Delete one of the caller's stories.
    ///
    /// # Errors
    ///
    /// Returns the server's error; the local list is left unchanged.
    pub async fn delete(&self, id: StoryId) -> Result<(), ClientError> {
        let result = self.api.delete_story(id).await;
        let mut state = lock(&self.state);
        match result {
            Ok(()) => {
                state.stories.retain(|s| s.id != id);
                state.error = None;
                Ok(())
            }
            Err(e) => {
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Replace the content of one of the caller's stories.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Invalid` for input that fails validation, or the
    /// server's error; the local list is left unchanged.
    pub async fn update(&self, id: StoryId, input: &StoryInput) -> Result<Story, ClientError> {
        input.validate()?;
        let result = self.api.update_story(id, input).await;
        let mut state = lock(&self.state);
        match result {
            Ok(story) => {
                if let Some(slot) = state.stories.iter_mut().find(|s| s.id == id) {
                    *slot = story.clone();
                }
                state.error = None;
                Ok(story)
            }
            Err(e) => {
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sharerides_core::Rating;

    use super::*;
    use crate::hooks::fake::{FakeApi, story};

    fn fixture() -> (Arc<FakeApi>, UserStories, Story) {
        let mine = story("ABC123", "me@example.com");
        let api = Arc::new(FakeApi::with(vec![
            mine.clone(),
            story("XYZ789", "someone@example.com"),
        ]));
        let hook = UserStories::new(Arc::clone(&api) as Arc<dyn StoriesApi>);
        (api, hook, mine)
    }

    #[tokio::test]
    async fn test_fetch_only_mine() {
        let (_api, hook, mine) = fixture();
        hook.fetch().await;
        let snapshot = hook.snapshot();
        assert!(!snapshot.loading);
        assert_eq!(snapshot.stories, vec![mine]);
    }

    #[tokio::test]
    async fn test_update_and_delete_after_confirmation() {
        let (_api, hook, mine) = fixture();
        hook.fetch().await;

        let input = StoryInput::new("ABC123", "Edited", Rating::Neutral);
        hook.update(mine.id, &input).await.unwrap();
        assert_eq!(hook.snapshot().stories[0].story, "Edited");

        hook.delete(mine.id).await.unwrap();
        assert!(hook.snapshot().stories.is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_story() {
        let (api, hook, mine) = fixture();
        hook.fetch().await;
        *api.fail_network.lock().unwrap() = true;

        assert!(hook.delete(mine.id).await.is_err());
        let snapshot = hook.snapshot();
        assert_eq!(snapshot.stories.len(), 1);
        assert_eq!(snapshot.error.as_deref(), Some("Network error"));
    }
}
