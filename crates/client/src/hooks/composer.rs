//! Story creation.

use std::sync::{Arc, Mutex};

use sharerides_core::{Story, StoryInput};

use super::lock;
use crate::api::StoriesApi;
use crate::error::ClientError;

/// Point-in-time view of a [`StoryComposer`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposerSnapshot {
    pub submitting: bool,
    pub error: Option<String>,
    pub last_created: Option<Story>,
}

/// Submits new stories.
///
/// Input is checked with the same rules the server applies before it is
/// sent; server-side rejections (including "Authentication required") are
/// surfaced as-is.
pub struct StoryComposer {
    api: Arc<dyn StoriesApi>,
    state: Mutex<ComposerSnapshot>,
}

impl StoryComposer {
    #[must_use]
    pub fn new(api: Arc<dyn StoriesApi>) -> Self {
        Self {
            api,
            state: Mutex::new(ComposerSnapshot::default()),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> ComposerSnapshot {
        lock(&self.state).clone()
    }

    /// Create a story.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Invalid` without contacting the server if the
    /// input fails validation, or the server's error otherwise.
    pub async fn submit(&self, input: &StoryInput) -> Result<Story, ClientError> {
        {
            let mut state = lock(&self.state);
            state.error = None;
            if let Err(e) = input.validate() {
                state.error = Some(e.to_string());
                return Err(e.into());
            }
            state.submitting = true;
        }

        let result = self.api.create_story(input).await;

        let mut state = lock(&self.state);
        state.submitting = false;
        match &result {
            Ok(story) => state.last_created = Some(story.clone()),
            Err(e) => state.error = Some(e.to_string()),
        }
        result
    }
}
