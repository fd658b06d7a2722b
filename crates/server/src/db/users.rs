//! `PostgreSQL` identity repository: users and magic-link tokens.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use sharerides_core::{Email, UserId};

use super::{IdentityStore, RepositoryError};
use crate::models::{User, VerificationToken};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: Email,
    name: Option<String>,
    image: Option<String>,
    email_verified: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            image: row.image,
            email_verified: row.email_verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TokenRow {
    identifier: Email,
    token_hash: String,
    expires_at: DateTime<Utc>,
}

impl From<TokenRow> for VerificationToken {
    fn from(row: TokenRow) -> Self {
        Self {
            identifier: row.identifier,
            token_hash: row.token_hash,
            expires_at: row.expires_at,
        }
    }
}

/// Repository for user and verification token operations.
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    /// Create a new identity repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    #[instrument(skip(self), fields(email = %email))]
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, image, email_verified, created_at, updated_at
            FROM users
            WHERE lower(email) = lower($1)
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn create_verified_user(&self, email: &Email) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO users (id, email, email_verified)
            VALUES ($1, $2, NOW())
            RETURNING id, email, name, image, email_verified, created_at, updated_at
            ",
        )
        .bind(UserId::generate())
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("email already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn mark_email_verified(&self, user: &User) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            UPDATE users
            SET email_verified = COALESCE(email_verified, NOW()), updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, name, image, email_verified, created_at, updated_at
            ",
        )
        .bind(user.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    #[instrument(skip(self, token), fields(email = %token.identifier))]
    async fn store_verification_token(
        &self,
        token: &VerificationToken,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            WITH purged AS (
                DELETE FROM verification_tokens WHERE expires_at <= NOW()
            )
            INSERT INTO verification_tokens (identifier, token_hash, expires_at)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(&token.identifier)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, token_hash), fields(email = %identifier))]
    async fn take_verification_token(
        &self,
        identifier: &Email,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>, RepositoryError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r"
            DELETE FROM verification_tokens
            WHERE identifier = $1 AND token_hash = $2
            RETURNING identifier, token_hash, expires_at
            ",
        )
        .bind(identifier)
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(VerificationToken::from))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    async fn test_store() -> PgIdentityStore {
        let url = std::env::var("TEST_DATABASE_URL").unwrap();
        let pool = PgPool::connect(&url).await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        PgIdentityStore::new(pool)
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
    async fn test_pg_token_is_single_use() {
        let store = test_store().await;
        let email = Email::parse(&format!("token-{}@example.com", UserId::generate())).unwrap();
        let token = VerificationToken {
            identifier: email.clone(),
            token_hash: "ab".repeat(32),
            expires_at: Utc::now() + Duration::hours(24),
        };
        store.store_verification_token(&token).await.unwrap();

        let taken = store
            .take_verification_token(&email, &token.token_hash)
            .await
            .unwrap();
        assert_eq!(taken.map(|t| t.identifier), Some(email.clone()));
        assert!(
            store
                .take_verification_token(&email, &token.token_hash)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
    async fn test_pg_storing_a_token_purges_expired_ones() {
        let store = test_store().await;
        let email = Email::parse(&format!("purge-{}@example.com", UserId::generate())).unwrap();
        let expired = VerificationToken {
            identifier: email.clone(),
            token_hash: "01".repeat(32),
            expires_at: Utc::now() - Duration::minutes(1),
        };
        sqlx::query(
            "INSERT INTO verification_tokens (identifier, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(&expired.identifier)
        .bind(&expired.token_hash)
        .bind(expired.expires_at)
        .execute(&store.pool)
        .await
        .unwrap();

        let fresh = VerificationToken {
            identifier: email.clone(),
            token_hash: "02".repeat(32),
            expires_at: Utc::now() + Duration::hours(24),
        };
        store.store_verification_token(&fresh).await.unwrap();

        let remaining: Vec<String> = sqlx::query_scalar(
            "SELECT token_hash FROM verification_tokens WHERE identifier = $1",
        )
        .bind(&email)
        .fetch_all(&store.pool)
        .await
        .unwrap();
        assert_eq!(remaining, vec![fresh.token_hash]);
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL (set TEST_DATABASE_URL)"]
    async fn test_pg_duplicate_user_conflicts() {
        let store = test_store().await;
        let email = Email::parse(&format!("dup-{}@example.com", UserId::generate())).unwrap();
        let user = store.create_verified_user(&email).await.unwrap();
        assert!(user.email_verified.is_some());

        let err = store.create_verified_user(&email).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let found = store.find_user_by_email(&email).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
    }
}
