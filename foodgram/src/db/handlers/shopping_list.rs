//! Aggregation query behind the shopping list download.

use crate::db::{errors::Result, models::recipes::ShoppingListItem};
use crate::types::{abbrev_uuid, UserId};
use sqlx::PgConnection;
use tracing::instrument;

pub struct ShoppingList<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ShoppingList<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Sum ingredient amounts over every recipe in the user's cart.
    ///
    /// Rows are grouped by catalog id, so two ingredients sharing a display name stay separate,
    /// and ordered by name, unit, then id.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn aggregate(&mut self, user_id: UserId) -> Result<Vec<ShoppingListItem>> {
        let items = sqlx::query_as::<_, ShoppingListItem>(
            r#"
            SELECT i.id AS ingredient_id, i.name, i.measurement_unit, SUM(ri.amount)::BIGINT AS total
            FROM shopping_cart sc
            JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE sc.user_id = $1
            GROUP BY i.id, i.name, i.measurement_unit
            ORDER BY i.name, i.measurement_unit, i.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(items)
    }
}
