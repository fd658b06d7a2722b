//! Integration test harness for ShareRideStories.
//!
//! [`TestServer::spawn`] starts the real router on an ephemeral port with
//! the in-memory store and a mailer that records outgoing email, so the
//! whole magic-link flow runs without SMTP or a database.
//!
//! Tests against `PostgreSQL` use [`TestServer::spawn_postgres`] and are
//! `#[ignore]`d unless `TEST_DATABASE_URL` is set:
//!
//! ```bash
//! TEST_DATABASE_URL=postgres://localhost/sharerides_test \
//!     cargo test -p sharerides-integration-tests -- --ignored
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;

use secrecy::SecretString;
use sqlx::PgPool;
use tower_sessions::MemoryStore;
use tower_sessions_sqlx_store::PostgresStore;

use sharerides_client::ApiClient;
use sharerides_server::config::ServerConfig;
use sharerides_server::db::{
    self, IdentityStore, InMemoryStore, PgIdentityStore, PgStoryStore, StoryStore,
};
use sharerides_server::services::{Mailer, RecordingMailer};
use sharerides_server::{AppState, router};

/// A server running in this process.
pub struct TestServer {
    pub addr: SocketAddr,
    pub base_url: String,
    pub mailer: Arc<RecordingMailer>,
    pub stories: Arc<dyn StoryStore>,
    pub pool: Option<PgPool>,
}

impl TestServer {
    /// Start a server backed by the in-memory store.
    pub async fn spawn() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let stories: Arc<dyn StoryStore> = store.clone();
        Self::start(stories, store, None).await
    }

    /// Start a server backed by `TEST_DATABASE_URL`, with migrations applied.
    pub async fn spawn_postgres() -> Self {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL not set");
        let pool = db::create_pool(&SecretString::from(url)).expect("invalid TEST_DATABASE_URL");
        sqlx::migrate!("../server/migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");
        PostgresStore::new(pool.clone())
            .migrate()
            .await
            .expect("Failed to create session table");

        let stories: Arc<dyn StoryStore> = Arc::new(PgStoryStore::new(pool.clone()));
        let identities = Arc::new(PgIdentityStore::new(pool.clone()));
        Self::start(stories, identities, Some(pool)).await
    }

    async fn start(
        stories: Arc<dyn StoryStore>,
        identities: Arc<dyn IdentityStore>,
        pool: Option<PgPool>,
    ) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{addr}");

        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(
            ServerConfig::in_memory(&base_url),
            Arc::clone(&stories),
            identities,
            Arc::clone(&mailer) as Arc<dyn Mailer>,
        );

        let app = match &pool {
            Some(pool) => router(state, PostgresStore::new(pool.clone())),
            None => router(state, MemoryStore::default()),
        };
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server failed");
        });

        Self {
            addr,
            base_url,
            mailer,
            stories,
            pool,
        }
    }

    /// A client with no session.
    pub fn anonymous(&self) -> ApiClient {
        ApiClient::new(&self.base_url).unwrap()
    }

    /// A client signed in as `email` through the emailed link.
    pub async fn signed_in(&self, email: &str) -> ApiClient {
        let client = self.anonymous();
        client.request_sign_in(email, Some("/")).await.unwrap();
        let link = self
            .mailer
            .last_link_for(&email.trim().to_lowercase())
            .expect("no sign-in link was sent");
        client.follow_sign_in_link(&link).await.unwrap();
        client
    }
}

/// A unique address, so tests sharing a database do not collide.
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", uuid_suffix())
}

/// A unique plate, so plate searches against a shared database stay exact.
pub fn unique_plate(prefix: &str) -> String {
    format!("{prefix}-{}", &uuid_suffix()[..8])
}

fn uuid_suffix() -> String {
    sharerides_core::StoryId::generate()
        .to_string()
        .replace('-', "")
}
