//! Database repository for follower -> author subscriptions.

use crate::db::errors::Result;
use crate::types::{abbrev_uuid, UserId};
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::instrument;

pub struct Subscriptions<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Subscriptions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Fails with a unique violation when already subscribed and a check violation for self
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), author_id = %abbrev_uuid(&author_id)), err)]
    pub async fn subscribe(&mut self, user_id: UserId, author_id: UserId) -> Result<()> {
        sqlx::query("INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(author_id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    /// Returns false when there was no subscription
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), author_id = %abbrev_uuid(&author_id)), err)]
    pub async fn unsubscribe(&mut self, user_id: UserId, author_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Which of `author_ids` the user follows
    #[instrument(skip(self, author_ids), fields(count = author_ids.len()), err)]
    pub async fn subscribed_among(&mut self, user_id: UserId, author_ids: &[UserId]) -> Result<HashSet<UserId>> {
        if author_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let ids = sqlx::query_scalar::<_, UserId>("SELECT author_id FROM subscriptions WHERE user_id = $1 AND author_id = ANY($2)")
            .bind(user_id)
            .bind(author_ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(ids.into_iter().collect())
    }

    /// Followed authors, ordered by username
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_authors(&mut self, user_id: UserId, skip: i64, limit: i64) -> Result<Vec<UserId>> {
        let ids = sqlx::query_scalar::<_, UserId>(
            r#"
            SELECT s.author_id
            FROM subscriptions s JOIN users u ON u.id = s.author_id
            WHERE s.user_id = $1
            ORDER BY u.username, u.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(ids)
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self, user_id: UserId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}
