//! Story listing with an optional plate filter.

use std::sync::{Arc, Mutex};

use sharerides_core::Story;

use super::lock;
use crate::api::{PageRequest, StoriesApi};

/// Point-in-time view of a [`StoriesFeed`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub plate: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
    pub stories: Vec<Story>,
    pub total: u64,
}

#[derive(Default)]
struct FeedState {
    /// Bumped by every fetch; only the latest fetch may write results.
    generation: u64,
    snapshot: FeedSnapshot,
}

/// Stories listing, optionally filtered by plate.
///
/// Changing the plate or refetching while a request is outstanding
/// supersedes it: the older response is dropped when it arrives.
pub struct StoriesFeed {
    api: Arc<dyn StoriesApi>,
    page: PageRequest,
    state: Mutex<FeedState>,
}

impl StoriesFeed {
    #[must_use]
    pub fn new(api: Arc<dyn StoriesApi>, plate: Option<String>) -> Self {
        Self {
            api,
            page: PageRequest::default(),
            state: Mutex::new(FeedState {
                generation: 0,
                snapshot: FeedSnapshot {
                    plate: normalize_plate(plate),
                    ..FeedSnapshot::default()
                },
            }),
        }
    }

    /// Request a specific page instead of the server default.
    #[must_use]
    pub const fn with_page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }

    #[must_use]
    pub fn snapshot(&self) -> FeedSnapshot {
        lock(&self.state).snapshot.clone()
    }

    /// Switch the plate filter and fetch. A blank plate lists everything.
    ///
    /// Returns whether this fetch's result was applied.
    pub async fn set_plate(&self, plate: Option<String>) -> bool {
        lock(&self.state).snapshot.plate = normalize_plate(plate);
        self.refetch().await
    }

    /// Fetch the current filter again.
    ///
    /// Returns `false` if a newer fetch started before this one finished,
    /// in which case the result is discarded.
    pub async fn refetch(&self) -> bool {
        let (generation, plate) = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.snapshot.loading = true;
            state.snapshot.error = None;
            (state.generation, state.snapshot.plate.clone())
        };

        let result = self.api.list_stories(plate.as_deref(), self.page).await;

        let mut state = lock(&self.state);
        if state.generation != generation {
            tracing::debug!(generation, latest = state.generation, "Discarding stale feed");
            return false;
        }

        state.snapshot.loading = false;
        match result {
            Ok(page) => {
                state.snapshot.stories = page.stories;
                state.snapshot.total = page.total;
            }
            Err(e) => state.snapshot.error = Some(e.to_string()),
        }
        true
    }

    /// Swap in a server-confirmed copy of one story, e.g. after an upvote.
    pub fn replace_story(&self, story: Story) {
        let mut state = lock(&self.state);
        if let Some(slot) = state.snapshot.stories.iter_mut().find(|s| s.id == story.id) {
            *slot = story;
        }
    }
}

fn normalize_plate(plate: Option<String>) -> Option<String> {
    plate
        .map(|p| p.trim().to_owned())
        .filter(|p| !p.is_empty())
}
