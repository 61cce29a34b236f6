//! API request/response models for recipes.
//!
//! Reads and writes use separate shapes: [`RecipeCreate`] / [`RecipeUpdate`] carry ingredient and tag
//! *ids*, while [`RecipeResponse`] nests full tag, author and ingredient objects. [`RecipeShortResponse`]
//! is the compact form returned by favorite/cart toggles and embedded in subscription listings.

use super::pagination::Pagination;
use super::tags::TagResponse;
use super::users::UserResponse;
use crate::db::models::recipes::{
    RecipeDBResponse, RecipeIngredientDBRequest, RecipeIngredientDBResponse, RecipeSummaryDBResponse,
};
use crate::errors::FieldError;
use crate::types::{IngredientId, RecipeId, TagId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use std::collections::HashSet;
use utoipa::{IntoParams, ToSchema};

pub const RECIPE_NAME_MAX_LENGTH: usize = 200;

/// An ingredient reference in a recipe submission
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct RecipeIngredientInput {
    /// Catalog id of the ingredient
    #[schema(value_type = String, format = "uuid")]
    pub id: IngredientId,
    /// Quantity in the ingredient's measurement unit, at least 1
    pub amount: i32,
}

impl From<RecipeIngredientInput> for RecipeIngredientDBRequest {
    fn from(input: RecipeIngredientInput) -> Self {
        Self {
            ingredient_id: input.id,
            amount: input.amount,
        }
    }
}

/// Body of `POST /recipes`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeCreate {
    pub ingredients: Vec<RecipeIngredientInput>,
    #[schema(value_type = Vec<String>)]
    pub tags: Vec<TagId>,
    /// Image as a `data:image/...;base64,` URI or bare base64
    pub image: String,
    pub name: String,
    pub text: String,
    /// Cooking time in minutes, at least 1
    pub cooking_time: i32,
}

/// Body of `PATCH /recipes/{id}`. Tags and ingredients replace the current sets.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeUpdate {
    pub ingredients: Vec<RecipeIngredientInput>,
    #[schema(value_type = Vec<String>)]
    pub tags: Vec<TagId>,
    /// New image; the current one is kept when omitted
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
}

impl RecipeCreate {
    /// Collect every field-level problem so the whole submission can be rejected at once
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = validate_common(&self.ingredients, &self.tags, &self.name, &self.text, self.cooking_time);
        if self.image.trim().is_empty() {
            errors.push(FieldError::new("image", "is required"));
        }
        errors
    }
}

impl RecipeUpdate {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = validate_common(&self.ingredients, &self.tags, &self.name, &self.text, self.cooking_time);
        if matches!(&self.image, Some(image) if image.trim().is_empty()) {
            errors.push(FieldError::new("image", "cannot be empty"));
        }
        errors
    }
}

fn validate_common(
    ingredients: &[RecipeIngredientInput],
    tags: &[TagId],
    name: &str,
    text: &str,
    cooking_time: i32,
) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if ingredients.is_empty() {
        errors.push(FieldError::new("ingredients", "at least one ingredient is required"));
    }
    let mut seen_ingredients = HashSet::new();
    for (i, ingredient) in ingredients.iter().enumerate() {
        if ingredient.amount < 1 {
            errors.push(FieldError::new(format!("ingredients[{i}].amount"), "must be at least 1"));
        }
        if !seen_ingredients.insert(ingredient.id) {
            errors.push(FieldError::new(
                format!("ingredients[{i}].id"),
                format!("ingredient {} is listed more than once", ingredient.id),
            ));
        }
    }

    if tags.is_empty() {
        errors.push(FieldError::new("tags", "at least one tag is required"));
    }
    let mut seen_tags = HashSet::new();
    for (i, tag) in tags.iter().enumerate() {
        if !seen_tags.insert(*tag) {
            errors.push(FieldError::new(format!("tags[{i}]"), format!("tag {tag} is listed more than once")));
        }
    }

    if name.trim().is_empty() || name.chars().count() > RECIPE_NAME_MAX_LENGTH {
        errors.push(FieldError::new("name", format!("must be between 1 and {RECIPE_NAME_MAX_LENGTH} characters")));
    }
    if text.trim().is_empty() {
        errors.push(FieldError::new("text", "is required"));
    }
    if cooking_time < 1 {
        errors.push(FieldError::new("cooking_time", "must be at least 1"));
    }

    errors
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeIngredientResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipeIngredientDBResponse> for RecipeIngredientResponse {
    fn from(db: RecipeIngredientDBResponse) -> Self {
        Self {
            id: db.ingredient_id,
            name: db.name,
            measurement_unit: db.measurement_unit,
            amount: db.amount,
        }
    }
}

/// Full read shape of a recipe
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: RecipeId,
    pub tags: Vec<TagResponse>,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredientResponse>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    /// Public URL of the recipe image
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub created_at: DateTime<Utc>,
}

impl RecipeResponse {
    pub fn new(db: RecipeDBResponse, author: UserResponse, image_url: String) -> Self {
        Self {
            id: db.id,
            tags: db.tags.into_iter().map(TagResponse::from).collect(),
            author,
            ingredients: db.ingredients.into_iter().map(RecipeIngredientResponse::from).collect(),
            is_favorited: false,
            is_in_shopping_cart: false,
            name: db.name,
            image: image_url,
            text: db.text,
            cooking_time: db.cooking_time,
            created_at: db.created_at,
        }
    }

    pub fn with_flags(mut self, is_favorited: bool, is_in_shopping_cart: bool) -> Self {
        self.is_favorited = is_favorited;
        self.is_in_shopping_cart = is_in_shopping_cart;
        self
    }
}

/// Compact recipe shape
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeShortResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: RecipeId,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl RecipeShortResponse {
    pub fn from_summary(summary: RecipeSummaryDBResponse, image_url: String) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            image: image_url,
            cooking_time: summary.cooking_time,
        }
    }
}

/// Query parameters for listing recipes.
///
/// `tags` may repeat (`?tags=breakfast&tags=lunch`), which the urlencoded deserializer cannot
/// express as a struct field, so it is filled in from the raw query string with [`Self::with_tags`].
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListRecipesQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only recipes by this author
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub author: Option<UserId>,

    /// `1` restricts to the caller's favorites (ignored for anonymous callers)
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub is_favorited: Option<u8>,

    /// `1` restricts to the caller's shopping cart (ignored for anonymous callers)
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub is_in_shopping_cart: Option<u8>,

    #[serde(skip)]
    pub tags: Vec<String>,
}

impl ListRecipesQuery {
    /// Pick every `tags=<slug>` pair out of a raw query string
    pub fn with_tags(mut self, raw_query: Option<&str>) -> Self {
        self.tags = raw_query
            .map(|raw| {
                url::form_urlencoded::parse(raw.as_bytes())
                    .filter(|(key, value)| key == "tags" && !value.is_empty())
                    .map(|(_, value)| value.into_owned())
                    .collect()
            })
            .unwrap_or_default();
        self
    }

    pub fn favorited_only(&self) -> bool {
        self.is_favorited == Some(1)
    }

    pub fn in_shopping_cart_only(&self) -> bool {
        self.is_in_shopping_cart == Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn submission() -> RecipeCreate {
        RecipeCreate {
            ingredients: vec![
                RecipeIngredientInput {
                    id: Uuid::new_v4(),
                    amount: 200,
                },
                RecipeIngredientInput {
                    id: Uuid::new_v4(),
                    amount: 2,
                },
            ],
            tags: vec![Uuid::new_v4()],
            image: "data:image/png;base64,iVBORw0KGgo=".to_string(),
            name: "Блины".to_string(),
            text: "Смешать и пожарить".to_string(),
            cooking_time: 30,
        }
    }

    #[test]
    fn test_valid_submission() {
        assert!(submission().validate().is_empty());
    }

    #[test]
    fn test_non_positive_amount_and_cooking_time() {
        let mut create = submission();
        create.ingredients[1].amount = 0;
        create.cooking_time = -5;

        let fields: Vec<_> = create.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["ingredients[1].amount", "cooking_time"]);
    }

    #[test]
    fn test_duplicate_ingredient_and_tag() {
        let mut create = submission();
        create.ingredients[1].id = create.ingredients[0].id;
        create.tags.push(create.tags[0]);

        let fields: Vec<_> = create.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["ingredients[1].id", "tags[1]"]);
    }

    #[test]
    fn test_empty_collections_and_image() {
        let mut create = submission();
        create.ingredients.clear();
        create.tags.clear();
        create.image = String::new();

        let fields: Vec<_> = create.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["ingredients", "tags", "image"]);
    }

    #[test]
    fn test_update_image_is_optional() {
        let create = submission();
        let update = RecipeUpdate {
            ingredients: create.ingredients,
            tags: create.tags,
            image: None,
            name: create.name,
            text: create.text,
            cooking_time: create.cooking_time,
        };
        assert!(update.validate().is_empty());
    }

    #[test]
    fn test_repeated_tags_collected_from_raw_query() {
        let query = ListRecipesQuery::default().with_tags(Some("tags=breakfast&limit=6&tags=lunch&tags="));
        assert_eq!(query.tags, vec!["breakfast", "lunch"]);

        let query = ListRecipesQuery::default().with_tags(None);
        assert!(query.tags.is_empty());
    }

    #[test]
    fn test_flag_filters_only_on_one() {
        let query = ListRecipesQuery {
            is_favorited: Some(1),
            is_in_shopping_cart: Some(0),
            ..Default::default()
        };
        assert!(query.favorited_only());
        assert!(!query.in_shopping_cart_only());
    }
}
