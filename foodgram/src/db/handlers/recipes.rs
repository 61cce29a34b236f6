//! Database repository for recipes.
//!
//! A recipe owns two sets of association rows, `recipe_tags` and `recipe_ingredients`. Both are
//! written wholesale: [`Recipes::create`] inserts them and [`Recipes::update`] deletes and
//! re-inserts them, each inside one transaction, so readers never observe a recipe mid-edit.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::{
        recipes::{
            RecipeCreateDBRequest, RecipeDBResponse, RecipeIngredientDBRequest, RecipeIngredientDBResponse,
            RecipeSummaryDBResponse, RecipeUpdateDBRequest,
        },
        tags::TagDBResponse,
    },
};
use crate::types::{abbrev_uuid, RecipeId, TagId, UserId};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing recipes, newest first
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub skip: i64,
    pub limit: i64,
    pub author_id: Option<UserId>,
    /// Recipes carrying any of these tag slugs
    pub tag_slugs: Vec<String>,
    /// Only recipes this user has favorited
    pub favorited_by: Option<UserId>,
    /// Only recipes in this user's shopping cart
    pub in_cart_of: Option<UserId>,
}

impl RecipeFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Recipe {
    pub id: RecipeId,
    pub author_id: UserId,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct RecipeTagRow {
    recipe_id: RecipeId,
    #[sqlx(flatten)]
    tag: TagDBResponse,
}

#[derive(Debug, FromRow)]
struct RecipeIngredientRow {
    recipe_id: RecipeId,
    #[sqlx(flatten)]
    line: RecipeIngredientDBResponse,
}

const RECIPE_COLUMNS: &str = "r.id, r.author_id, r.name, r.image, r.text, r.cooking_time, r.created_at, r.updated_at";

pub struct Recipes<'c> {
    db: &'c mut PgConnection,
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &RecipeFilter) {
    query.push(" WHERE TRUE");

    if let Some(author_id) = filter.author_id {
        query.push(" AND r.author_id = ").push_bind(author_id);
    }
    if !filter.tag_slugs.is_empty() {
        query
            .push(" AND EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(")
            .push_bind(filter.tag_slugs.clone())
            .push("))");
    }
    if let Some(user_id) = filter.favorited_by {
        query
            .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
            .push_bind(user_id)
            .push(")");
    }
    if let Some(user_id) = filter.in_cart_of {
        query
            .push(" AND EXISTS (SELECT 1 FROM shopping_cart sc WHERE sc.recipe_id = r.id AND sc.user_id = ")
            .push_bind(user_id)
            .push(")");
    }
}

/// Write the association rows for a recipe. Ingredient order is kept through `position`.
async fn insert_children(
    conn: &mut PgConnection,
    recipe_id: RecipeId,
    tags: &[TagId],
    ingredients: &[RecipeIngredientDBRequest],
) -> Result<()> {
    sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) SELECT $1, tag_id FROM UNNEST($2::uuid[]) AS tag_id")
        .bind(recipe_id)
        .bind(tags)
        .execute(&mut *conn)
        .await?;

    let ingredient_ids: Vec<Uuid> = ingredients.iter().map(|i| i.ingredient_id).collect();
    let amounts: Vec<i32> = ingredients.iter().map(|i| i.amount).collect();
    sqlx::query(
        r#"
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount, position)
        SELECT $1, u.ingredient_id, u.amount, u.position::INTEGER
        FROM UNNEST($2::uuid[], $3::int4[]) WITH ORDINALITY AS u(ingredient_id, amount, position)
        "#,
    )
    .bind(recipe_id)
    .bind(&ingredient_ids)
    .bind(&amounts)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Attach tags and ingredient lines to recipe rows, keeping the row order
async fn with_children(conn: &mut PgConnection, recipes: Vec<Recipe>) -> Result<Vec<RecipeDBResponse>> {
    if recipes.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<RecipeId> = recipes.iter().map(|r| r.id).collect();

    let tag_rows = sqlx::query_as::<_, RecipeTagRow>(
        r#"
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.name
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let ingredient_rows = sqlx::query_as::<_, RecipeIngredientRow>(
        r#"
        SELECT ri.recipe_id, i.id AS ingredient_id, i.name, i.measurement_unit, ri.amount
        FROM recipe_ingredients ri JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY ri.position, i.name
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut tags: HashMap<RecipeId, Vec<TagDBResponse>> = HashMap::new();
    for row in tag_rows {
        tags.entry(row.recipe_id).or_default().push(row.tag);
    }
    let mut lines: HashMap<RecipeId, Vec<RecipeIngredientDBResponse>> = HashMap::new();
    for row in ingredient_rows {
        lines.entry(row.recipe_id).or_default().push(row.line);
    }

    Ok(recipes
        .into_iter()
        .map(|recipe| RecipeDBResponse {
            tags: tags.remove(&recipe.id).unwrap_or_default(),
            ingredients: lines.remove(&recipe.id).unwrap_or_default(),
            id: recipe.id,
            author_id: recipe.author_id,
            name: recipe.name,
            image: recipe.image,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
            created_at: recipe.created_at,
            updated_at: recipe.updated_at,
        })
        .collect())
}

#[async_trait::async_trait]
impl<'c> Repository for Recipes<'c> {
    type CreateRequest = RecipeCreateDBRequest;
    type UpdateRequest = RecipeUpdateDBRequest;
    type Response = RecipeDBResponse;
    type Id = RecipeId;
    type Filter = RecipeFilter;

    #[instrument(skip(self, request), fields(author_id = %abbrev_uuid(&request.author_id), name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let recipe_id = Uuid::new_v4();
        let mut tx = self.db.begin().await?;

        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            INSERT INTO recipes AS r (id, author_id, name, image, text, cooking_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(recipe_id)
        .bind(request.author_id)
        .bind(&request.name)
        .bind(&request.image)
        .bind(&request.text)
        .bind(request.cooking_time)
        .fetch_one(&mut *tx)
        .await?;

        insert_children(&mut *tx, recipe_id, &request.tags, &request.ingredients).await?;

        let created = with_children(&mut *tx, vec![recipe]).await?.pop().ok_or(DbError::NotFound)?;
        tx.commit().await?;

        Ok(created)
    }

    #[instrument(skip(self), fields(recipe_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let recipe = sqlx::query_as::<_, Recipe>(&format!("SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        match recipe {
            Some(recipe) => Ok(with_children(&mut *self.db, vec![recipe]).await?.pop()),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let recipes = sqlx::query_as::<_, Recipe>(&format!("SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = ANY($1)"))
            .bind(ids.as_slice())
            .fetch_all(&mut *self.db)
            .await?;

        Ok(with_children(&mut *self.db, recipes)
            .await?
            .into_iter()
            .map(|recipe| (recipe.id, recipe))
            .collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!("SELECT {RECIPE_COLUMNS} FROM recipes r"));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY r.created_at DESC, r.id LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.skip);

        let recipes = query.build_query_as::<Recipe>().fetch_all(&mut *self.db).await?;

        with_children(&mut *self.db, recipes).await
    }

    #[instrument(skip(self), fields(recipe_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the recipe's fields and both child sets in one transaction
    #[instrument(skip(self, request), fields(recipe_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            UPDATE recipes AS r SET
                name = $2,
                image = COALESCE($3, r.image),
                text = $4,
                cooking_time = $5,
                updated_at = NOW()
            WHERE r.id = $1
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.name)
        .bind(&request.image)
        .bind(&request.text)
        .bind(request.cooking_time)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_children(&mut *tx, id, &request.tags, &request.ingredients).await?;

        let updated = with_children(&mut *tx, vec![recipe]).await?.pop().ok_or(DbError::NotFound)?;
        tx.commit().await?;

        Ok(updated)
    }
}

impl<'c> Recipes<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Number of recipes matching the filter, ignoring skip/limit
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &RecipeFilter) -> Result<i64> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM recipes r");
        push_filters(&mut query, filter);

        let count = query.build_query_scalar::<i64>().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    /// Author of a recipe, or `None` if the recipe does not exist
    #[instrument(skip(self), fields(recipe_id = %abbrev_uuid(&id)), err)]
    pub async fn author_of(&mut self, id: RecipeId) -> Result<Option<UserId>> {
        let author = sqlx::query_scalar::<_, UserId>("SELECT author_id FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(author)
    }

    #[instrument(skip(self), fields(recipe_id = %abbrev_uuid(&id)), err)]
    pub async fn get_summary(&mut self, id: RecipeId) -> Result<Option<RecipeSummaryDBResponse>> {
        let summary = sqlx::query_as::<_, RecipeSummaryDBResponse>(
            "SELECT id, author_id, name, image, cooking_time FROM recipes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;
        Ok(summary)
    }

    /// The newest `limit` recipes of each author, newest first
    #[instrument(skip(self, author_ids), fields(count = author_ids.len()), err)]
    pub async fn recent_by_authors(
        &mut self,
        author_ids: &[UserId],
        limit: i64,
    ) -> Result<HashMap<UserId, Vec<RecipeSummaryDBResponse>>> {
        if author_ids.is_empty() || limit <= 0 {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, RecipeSummaryDBResponse>(
            r#"
            SELECT id, author_id, name, image, cooking_time FROM (
                SELECT id, author_id, name, image, cooking_time, created_at,
                       ROW_NUMBER() OVER (PARTITION BY author_id ORDER BY created_at DESC, id) AS rn
                FROM recipes
                WHERE author_id = ANY($1)
            ) ranked
            WHERE rn <= $2
            ORDER BY author_id, created_at DESC, id
            "#,
        )
        .bind(author_ids)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        let mut by_author: HashMap<UserId, Vec<RecipeSummaryDBResponse>> = HashMap::new();
        for row in rows {
            by_author.entry(row.author_id).or_default().push(row);
        }
        Ok(by_author)
    }

    /// Total published recipes per author; authors without recipes are absent
    #[instrument(skip(self, author_ids), fields(count = author_ids.len()), err)]
    pub async fn count_by_authors(&mut self, author_ids: &[UserId]) -> Result<HashMap<UserId, i64>> {
        if author_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, (UserId, i64)>(
            "SELECT author_id, COUNT(*) FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
        )
        .bind(author_ids)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows.into_iter().collect())
    }
}
