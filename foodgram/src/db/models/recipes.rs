//! Database models for recipes and their association rows.

use crate::db::models::tags::TagDBResponse;
use crate::types::{IngredientId, RecipeId, TagId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// One `(ingredient, amount)` association to write for a recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipeIngredientDBRequest {
    pub ingredient_id: IngredientId,
    pub amount: i32,
}

/// Database request for creating a recipe together with its tags and ingredients
#[derive(Debug, Clone)]
pub struct RecipeCreateDBRequest {
    pub author_id: UserId,
    pub name: String,
    /// Path of the stored image, relative to the media root
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub tags: Vec<TagId>,
    pub ingredients: Vec<RecipeIngredientDBRequest>,
}

/// Database request for editing a recipe.
///
/// Tags and ingredients always replace the existing sets; the image is kept when `None`.
#[derive(Debug, Clone)]
pub struct RecipeUpdateDBRequest {
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i32,
    pub tags: Vec<TagId>,
    pub ingredients: Vec<RecipeIngredientDBRequest>,
}

/// An ingredient line of a recipe, joined with the catalog
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RecipeIngredientDBResponse {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// Database response for a recipe with its children loaded
#[derive(Debug, Clone)]
pub struct RecipeDBResponse {
    pub id: RecipeId,
    pub author_id: UserId,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<TagDBResponse>,
    pub ingredients: Vec<RecipeIngredientDBResponse>,
}

/// One aggregated line of a user's shopping list
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ShoppingListItem {
    pub ingredient_id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub total: i64,
}

/// Recipe columns without children, used for previews
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RecipeSummaryDBResponse {
    pub id: RecipeId,
    pub author_id: UserId,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}
