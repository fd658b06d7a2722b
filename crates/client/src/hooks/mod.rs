//! Client-side story state.
//!
//! Each hook owns a snapshot of server data and only changes it after the
//! server confirms an action. None of them retries on failure.

mod composer;
mod feed;
mod upvoter;
mod user_stories;

pub use composer::{ComposerSnapshot, StoryComposer};
pub use feed::{FeedSnapshot, StoriesFeed};
pub use upvoter::Upvoter;
pub use user_stories::{UserStories, UserStoriesSnapshot};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock hook state; a panic elsewhere never wedges the hook.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod fake {
    //! In-process stand-in for the story API.

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Utc;
    use reqwest::StatusCode;
    use tokio::sync::Notify;

    use sharerides_core::{
        Email, PlateNumber, Rating, Story, StoryId, StoryInput, UserId,
    };

    use crate::api::{PageRequest, StoriesApi, StoryPage};
    use crate::error::ClientError;

    pub fn story(plate: &str, owner: &str) -> Story {
        Story {
            id: StoryId::generate(),
            plate_number: PlateNumber::parse(plate).unwrap(),
            story: "Friendly driver".to_owned(),
            timestamp: Utc::now(),
            location: None,
            rating: Rating::Positive,
            upvotes: 0,
            user_id: UserId::generate(),
            user_email: Email::parse(owner).unwrap(),
        }
    }

    /// Serves stories from memory; listing a plate with a gate waits for it.
    #[derive(Default)]
    pub struct FakeApi {
        pub stories: Mutex<Vec<Story>>,
        pub gates: Mutex<HashMap<String, Arc<Notify>>>,
        pub voters: Mutex<Vec<StoryId>>,
        pub upvote_gate: Mutex<Option<Arc<Notify>>>,
        pub fail_network: Mutex<bool>,
    }

    impl FakeApi {
        pub fn with(stories: Vec<Story>) -> Self {
            Self {
                stories: Mutex::new(stories),
                ..Self::default()
            }
        }

        pub fn gate(&self, plate: &str) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            self.gates
                .lock()
                .unwrap()
                .insert(plate.to_owned(), Arc::clone(&gate));
            gate
        }

        fn not_found() -> ClientError {
            ClientError::Api {
                status: StatusCode::NOT_FOUND,
                message: "Story not found".to_owned(),
            }
        }

        fn network_check(&self) -> Result<(), ClientError> {
            if *self.fail_network.lock().unwrap() {
                return Err(ClientError::Decode(
                    serde_json::from_str::<u8>("<html>").unwrap_err(),
                ));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl StoriesApi for FakeApi {
        async fn list_stories(
            &self,
            plate: Option<&str>,
            _page: PageRequest,
        ) -> Result<StoryPage, ClientError> {
            let gate = plate.and_then(|p| self.gates.lock().unwrap().get(p).cloned());
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.network_check()?;
            let stories: Vec<Story> = self
                .stories
                .lock()
                .unwrap()
                .iter()
                .filter(|s| plate.is_none_or(|p| s.plate_number.as_str() == p))
                .cloned()
                .collect();
            Ok(StoryPage {
                total: stories.len() as u64,
                stories,
            })
        }

        async fn create_story(&self, input: &StoryInput) -> Result<Story, ClientError> {
            self.network_check()?;
            let mut created = story(input.plate_number.as_deref().unwrap(), "me@example.com");
            created.story = input.story.clone().unwrap();
            self.stories.lock().unwrap().push(created.clone());
            Ok(created)
        }

        async fn update_story(
            &self,
            id: StoryId,
            input: &StoryInput,
        ) -> Result<Story, ClientError> {
            self.network_check()?;
            let mut stories = self.stories.lock().unwrap();
            let story = stories
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(Self::not_found)?;
            story.story = input.story.clone().unwrap();
            Ok(story.clone())
        }

        async fn delete_story(&self, id: StoryId) -> Result<(), ClientError> {
            self.network_check()?;
            let mut stories = self.stories.lock().unwrap();
            let before = stories.len();
            stories.retain(|s| s.id != id);
            if stories.len() == before {
                return Err(Self::not_found());
            }
            Ok(())
        }

        async fn upvote_story(&self, id: StoryId) -> Result<Story, ClientError> {
            let gate = self.upvote_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.network_check()?;
            self.voters.lock().unwrap().push(id);
            let mut stories = self.stories.lock().unwrap();
            let story = stories
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(Self::not_found)?;
            story.upvotes += 1;
            Ok(story.clone())
        }

        async fn my_stories(&self) -> Result<Vec<Story>, ClientError> {
            self.network_check()?;
            Ok(self
                .stories
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.user_email.as_str() == "me@example.com")
                .cloned()
                .collect())
        }
    }
}
