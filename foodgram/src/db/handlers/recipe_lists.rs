//! Per-user recipe sets: favorites and the shopping cart.
//!
//! Both are plain `(user_id, recipe_id)` tables with a unique key, so the row's existence is
//! the state. Adding a pair that is already present surfaces as [`DbError::UniqueViolation`]
//! straight from the constraint, which keeps concurrent adds race-free.
//!
//! [`DbError::UniqueViolation`]: crate::db::errors::DbError::UniqueViolation

use crate::db::errors::Result;
use crate::types::{abbrev_uuid, RecipeId, UserId};
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeListKind {
    Favorites,
    ShoppingCart,
}

impl RecipeListKind {
    fn table(self) -> &'static str {
        match self {
            RecipeListKind::Favorites => "favorites",
            RecipeListKind::ShoppingCart => "shopping_cart",
        }
    }

    /// Human readable name for messages
    pub fn label(self) -> &'static str {
        match self {
            RecipeListKind::Favorites => "favorites",
            RecipeListKind::ShoppingCart => "shopping cart",
        }
    }
}

pub struct RecipeLists<'c> {
    db: &'c mut PgConnection,
    kind: RecipeListKind,
}

impl<'c> RecipeLists<'c> {
    pub fn new(db: &'c mut PgConnection, kind: RecipeListKind) -> Self {
        Self { db, kind }
    }

    pub fn favorites(db: &'c mut PgConnection) -> Self {
        Self::new(db, RecipeListKind::Favorites)
    }

    pub fn shopping_cart(db: &'c mut PgConnection) -> Self {
        Self::new(db, RecipeListKind::ShoppingCart)
    }

    #[instrument(skip(self), fields(list = self.kind.table(), user_id = %abbrev_uuid(&user_id), recipe_id = %abbrev_uuid(&recipe_id)), err)]
    pub async fn add(&mut self, user_id: UserId, recipe_id: RecipeId) -> Result<()> {
        sqlx::query(&format!("INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2)", self.kind.table()))
            .bind(user_id)
            .bind(recipe_id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    /// Returns false when the pair was not present
    #[instrument(skip(self), fields(list = self.kind.table(), user_id = %abbrev_uuid(&user_id), recipe_id = %abbrev_uuid(&recipe_id)), err)]
    pub async fn remove(&mut self, user_id: UserId, recipe_id: RecipeId) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2", self.kind.table()))
            .bind(user_id)
            .bind(recipe_id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Which of `recipe_ids` are in the user's list
    #[instrument(skip(self, recipe_ids), fields(list = self.kind.table(), count = recipe_ids.len()), err)]
    pub async fn containing(&mut self, user_id: UserId, recipe_ids: &[RecipeId]) -> Result<HashSet<RecipeId>> {
        if recipe_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let ids = sqlx::query_scalar::<_, RecipeId>(&format!(
            "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = ANY($2)",
            self.kind.table()
        ))
        .bind(user_id)
        .bind(recipe_ids)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(ids.into_iter().collect())
    }

    #[instrument(skip(self), fields(list = self.kind.table()), err)]
    pub async fn count(&mut self, user_id: UserId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {} WHERE user_id = $1", self.kind.table()))
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}
