//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::{MailTransport, ServerConfig, StoreBackend};
use crate::db::{self, IdentityStore, InMemoryStore, PgIdentityStore, PgStoryStore, StoryStore};
use crate::services::email::{EmailService, LogMailer, Mailer, SmtpMailer};

/// Error building application state from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid database url: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid SMTP configuration: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the stores, the email service, and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    stories: Arc<dyn StoryStore>,
    identities: Arc<dyn IdentityStore>,
    email: EmailService,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create application state from explicit parts.
    ///
    /// Tests use this to inject an in-memory store and a recording mailer.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        stories: Arc<dyn StoryStore>,
        identities: Arc<dyn IdentityStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self::build(config, stories, identities, mailer, None)
    }

    fn build(
        config: ServerConfig,
        stories: Arc<dyn StoryStore>,
        identities: Arc<dyn IdentityStore>,
        mailer: Arc<dyn Mailer>,
        pool: Option<PgPool>,
    ) -> Self {
        let email = EmailService::new(
            mailer,
            config.email.from_address.clone(),
            config.base_url.clone(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                stories,
                identities,
                email,
                pool,
            }),
        }
    }

    /// Create application state as configured.
    ///
    /// With the `postgres` backend the pool is created lazily: no connection
    /// is made until the first query.
    ///
    /// # Errors
    ///
    /// Returns an error if the database URL or SMTP relay is invalid.
    pub fn from_config(config: ServerConfig) -> Result<Self, StateError> {
        let mailer: Arc<dyn Mailer> = match &config.email.transport {
            MailTransport::Log => Arc::new(LogMailer),
            MailTransport::Smtp(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        };

        let (stories, identities, pool): (Arc<dyn StoryStore>, Arc<dyn IdentityStore>, _) =
            match &config.store {
                StoreBackend::Postgres(url) => {
                    let pool = db::create_pool(url)?;
                    (
                        Arc::new(PgStoryStore::new(pool.clone())),
                        Arc::new(PgIdentityStore::new(pool.clone())),
                        Some(pool),
                    )
                }
                StoreBackend::Memory => {
                    let store = Arc::new(InMemoryStore::new());
                    let stories: Arc<dyn StoryStore> = store.clone();
                    (stories, store as Arc<dyn IdentityStore>, None)
                }
            };

        Ok(Self::build(config, stories, identities, mailer, pool))
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get the story store.
    #[must_use]
    pub fn stories(&self) -> &dyn StoryStore {
        self.inner.stories.as_ref()
    }

    /// Get the identity store.
    #[must_use]
    pub fn identities(&self) -> &dyn IdentityStore {
        self.inner.identities.as_ref()
    }

    /// Get the email service.
    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    /// The `PostgreSQL` pool, when running against `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
