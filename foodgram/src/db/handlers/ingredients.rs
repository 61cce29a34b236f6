//! Database repository for the ingredient catalog.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::ingredients::{IngredientCreateDBRequest, IngredientDBResponse},
};
use crate::types::{abbrev_uuid, IngredientId};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for searching the catalog
#[derive(Debug, Clone, Default)]
pub struct IngredientFilter {
    /// Case-insensitive name prefix
    pub name_prefix: Option<String>,
}

pub struct Ingredients<'c> {
    db: &'c mut PgConnection,
}

/// Escape `LIKE` metacharacters so a user-supplied prefix matches literally
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait::async_trait]
impl<'c> Repository for Ingredients<'c> {
    type CreateRequest = IngredientCreateDBRequest;
    /// The catalog is immutable once created
    type UpdateRequest = ();
    type Response = IngredientDBResponse;
    type Id = IngredientId;
    type Filter = IngredientFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let ingredient = sqlx::query_as::<_, IngredientDBResponse>(
            "INSERT INTO ingredients (id, name, measurement_unit) VALUES ($1, $2, $3) RETURNING id, name, measurement_unit",
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.measurement_unit)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(ingredient)
    }

    #[instrument(skip(self), fields(ingredient_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let ingredient =
            sqlx::query_as::<_, IngredientDBResponse>("SELECT id, name, measurement_unit FROM ingredients WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *self.db)
                .await?;

        Ok(ingredient)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ingredients =
            sqlx::query_as::<_, IngredientDBResponse>("SELECT id, name, measurement_unit FROM ingredients WHERE id = ANY($1)")
                .bind(ids.as_slice())
                .fetch_all(&mut *self.db)
                .await?;

        Ok(ingredients.into_iter().map(|i| (i.id, i)).collect())
    }

    #[instrument(skip(self, filter), fields(prefix = ?filter.name_prefix), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT id, name, measurement_unit FROM ingredients");

        if let Some(prefix) = filter.name_prefix.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            query.push(" WHERE LOWER(name) LIKE LOWER(");
            query.push_bind(format!("{}%", escape_like(prefix)));
            query.push(")");
        }

        query.push(" ORDER BY name, measurement_unit");

        let ingredients = query
            .build_query_as::<IngredientDBResponse>()
            .fetch_all(&mut *self.db)
            .await?;

        Ok(ingredients)
    }

    /// Fails with a foreign key violation while any recipe still uses the ingredient
    #[instrument(skip(self), fields(ingredient_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM ingredients WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update(&mut self, _id: Self::Id, _request: &Self::UpdateRequest) -> Result<Self::Response> {
        Err(DbError::Other(anyhow::anyhow!("ingredients are immutable")))
    }
}

impl<'c> Ingredients<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn ingredient(name: &str, unit: &str) -> IngredientCreateDBRequest {
        IngredientCreateDBRequest {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
        }
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("мука"), "мука");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_prefix_search_is_case_insensitive(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Ingredients::new(&mut conn);

        repo.create(&ingredient("Salt", "g")).await.unwrap();
        repo.create(&ingredient("salted butter", "g")).await.unwrap();
        repo.create(&ingredient("Sugar", "g")).await.unwrap();
        repo.create(&ingredient("Sea salt", "g")).await.unwrap();

        let names: Vec<_> = repo
            .list(&IngredientFilter {
                name_prefix: Some("SAL".to_string()),
            })
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["Salt", "salted butter"]);

        assert_eq!(repo.list(&IngredientFilter::default()).await.unwrap().len(), 4);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_wildcards_in_prefix_match_literally(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Ingredients::new(&mut conn);

        repo.create(&ingredient("Flour", "g")).await.unwrap();

        let found = repo
            .list(&IngredientFilter {
                name_prefix: Some("%".to_string()),
            })
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_same_name_different_unit_allowed(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Ingredients::new(&mut conn);

        repo.create(&ingredient("Milk", "ml")).await.unwrap();
        repo.create(&ingredient("Milk", "cup")).await.unwrap();

        let err = repo.create(&ingredient("Milk", "ml")).await.unwrap_err();
        assert_eq!(err.constraint(), Some("ingredients_name_unit_unique"));
    }
}
