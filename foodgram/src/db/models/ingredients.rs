//! Database models for the ingredient catalog.

use crate::api::models::ingredients::IngredientCreate;
use crate::types::IngredientId;
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct IngredientCreateDBRequest {
    pub name: String,
    pub measurement_unit: String,
}

impl From<IngredientCreate> for IngredientCreateDBRequest {
    fn from(api: IngredientCreate) -> Self {
        Self {
            name: api.name.trim().to_string(),
            measurement_unit: api.measurement_unit.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct IngredientDBResponse {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
}
