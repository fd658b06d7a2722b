//! `PostgreSQL` story repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use sharerides_core::{Email, PlateNumber, Rating, StoryId, UserId, ValidStory};

use super::{Page, RepositoryError, StoryFilter, StoryStore, UpvoteOutcome};
use crate::models::{NewStory, StoryRecord};

/// Row shape of the `stories` table.
#[derive(Debug, sqlx::FromRow)]
struct StoryRow {
    id: StoryId,
    plate_number: PlateNumber,
    story: String,
    location: Option<String>,
    rating: Rating,
    upvotes: i64,
    /// `NULL` on legacy rows.
    upvoted_by: Option<Vec<String>>,
    user_id: UserId,
    user_email: Email,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StoryRow> for StoryRecord {
    type Error = RepositoryError;

    fn try_from(row: StoryRow) -> Result<Self, Self::Error> {
        let upvotes = u64::try_from(row.upvotes).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative upvotes ({}) on story {}",
                row.upvotes, row.id
            ))
        })?;

        let upvoted_by = row
            .upvoted_by
            .unwrap_or_default()
            .iter()
            .map(|voter| {
                Email::parse(voter).map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid voter in database: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: row.id,
            plate_number: row.plate_number,
            story: row.story,
            location: row.location,
            rating: row.rating,
            upvotes,
            upvoted_by,
            user_id: row.user_id,
            user_email: row.user_email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_records(rows: Vec<StoryRow>) -> Result<Vec<StoryRecord>, RepositoryError> {
    rows.into_iter().map(StoryRecord::try_from).collect()
}

/// Story repository backed by the `stories` table.
#[derive(Clone)]
pub struct PgStoryStore {
    pool: PgPool,
}

impl PgStoryStore {
    /// Create a new story repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StoryStore for PgStoryStore {
    #[instrument(skip(self), fields(plate = ?filter.plate_number))]
    async fn list(
        &self,
        filter: &StoryFilter,
        page: Page,
    ) -> Result<(Vec<StoryRecord>, u64), RepositoryError> {
        let plate = filter.plate_number.as_ref().map(PlateNumber::as_str);

        let rows = sqlx::query_as::<_, StoryRow>(
            r"
            SELECT id, plate_number, story, location, rating, upvotes, upvoted_by,
                   user_id, user_email, created_at, updated_at
            FROM stories
            WHERE ($1::TEXT IS NULL OR plate_number = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(plate)
        .bind(page.limit.map(i64::from))
        .bind(i64::from(page.skip))
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM stories
            WHERE ($1::TEXT IS NULL OR plate_number = $1)
            ",
        )
        .bind(plate)
        .fetch_one(&self.pool)
        .await?;

        let total = u64::try_from(total)
            .map_err(|_| RepositoryError::DataCorruption(format!("negative count {total}")))?;

        Ok((into_records(rows)?, total))
    }

    #[instrument(skip(self), fields(story_id = %id))]
    async fn get(&self, id: StoryId) -> Result<Option<StoryRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, StoryRow>(
            r"
            SELECT id, plate_number, story, location, rating, upvotes, upvoted_by,
                   user_id, user_email, created_at, updated_at
            FROM stories
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(StoryRecord::try_from).transpose()
    }

    #[instrument(skip(self, new), fields(plate = %new.content.plate_number, email = %new.owner.email))]
    async fn insert(&self, new: NewStory) -> Result<StoryRecord, RepositoryError> {
        let row = sqlx::query_as::<_, StoryRow>(
            r"
            INSERT INTO stories (id, plate_number, story, location, rating, user_id, user_email)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, plate_number, story, location, rating, upvotes, upvoted_by,
                      user_id, user_email, created_at, updated_at
            ",
        )
        .bind(StoryId::generate())
        .bind(&new.content.plate_number)
        .bind(&new.content.story)
        .bind(new.content.location.as_deref())
        .bind(new.content.rating)
        .bind(new.owner.id)
        .bind(&new.owner.email)
        .fetch_one(&self.pool)
        .await?;

        StoryRecord::try_from(row)
    }

    #[instrument(skip(self, patch), fields(story_id = %id))]
    async fn update(
        &self,
        id: StoryId,
        patch: &ValidStory,
    ) -> Result<Option<StoryRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, StoryRow>(
            r"
            UPDATE stories
            SET plate_number = $2, story = $3, location = $4, rating = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING id, plate_number, story, location, rating, upvotes, upvoted_by,
                      user_id, user_email, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(&patch.plate_number)
        .bind(&patch.story)
        .bind(patch.location.as_deref())
        .bind(patch.rating)
        .fetch_optional(&self.pool)
        .await?;

        row.map(StoryRecord::try_from).transpose()
    }

    #[instrument(skip(self), fields(story_id = %id))]
    async fn delete(&self, id: StoryId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM stories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(story_id = %id, email = %voter))]
    async fn upvote(&self, id: StoryId, voter: &Email) -> Result<UpvoteOutcome, RepositoryError> {
        // One conditional statement: the row lock taken by UPDATE serializes
        // concurrent voters on the same story.
        let row = sqlx::query_as::<_, StoryRow>(
            r"
            UPDATE stories
            SET upvotes = upvotes + 1,
                upvoted_by = array_append(COALESCE(upvoted_by, '{}'::TEXT[]), $2),
                updated_at = NOW()
            WHERE id = $1
              AND NOT ($2 = ANY(COALESCE(upvoted_by, '{}'::TEXT[])))
            RETURNING id, plate_number, story, location, rating, upvotes, upvoted_by,
                      user_id, user_email, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(voter.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(UpvoteOutcome::Upvoted(StoryRecord::try_from(row)?));
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM stories WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(if exists {
            UpvoteOutcome::AlreadyUpvoted
        } else {
            UpvoteOutcome::NotFound
        })
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn list_by_owner(&self, email: &Email) -> Result<Vec<StoryRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, StoryRow>(
            r"
            SELECT id, plate_number, story, location, rating, upvotes, upvoted_by,
                   user_id, user_email, created_at, updated_at
            FROM stories
            WHERE user_email = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        into_records(rows)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
