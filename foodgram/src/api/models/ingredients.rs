//! API request/response models for the ingredient catalog.

use crate::db::models::ingredients::IngredientDBResponse;
use crate::errors::FieldError;
use crate::types::IngredientId;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const INGREDIENT_FIELD_MAX_LENGTH: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IngredientCreate {
    pub name: String,
    pub measurement_unit: String,
}

impl IngredientCreate {
    pub fn validate(&self) -> Vec<FieldError> {
        [("name", &self.name), ("measurement_unit", &self.measurement_unit)]
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty() || value.chars().count() > INGREDIENT_FIELD_MAX_LENGTH)
            .map(|(field, _)| FieldError::new(field, format!("must be between 1 and {INGREDIENT_FIELD_MAX_LENGTH} characters")))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IngredientResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
}

impl From<IngredientDBResponse> for IngredientResponse {
    fn from(db: IngredientDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            measurement_unit: db.measurement_unit,
        }
    }
}

/// Query parameters for searching the catalog
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListIngredientsQuery {
    /// Case-insensitive prefix of the ingredient name
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fields_rejected() {
        let create = IngredientCreate {
            name: "мука".to_string(),
            measurement_unit: " ".to_string(),
        };
        let errors = create.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "measurement_unit");
    }
}
