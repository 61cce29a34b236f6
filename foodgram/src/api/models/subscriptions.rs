//! API models for following authors.

use super::pagination::Pagination;
use super::recipes::RecipeShortResponse;
use super::users::UserResponse;
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use utoipa::{IntoParams, ToSchema};

/// A followed author together with a preview of their recipes
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    /// The author's newest recipes, at most `recipes_limit` of them
    pub recipes: Vec<RecipeShortResponse>,
    /// Total number of recipes the author has published
    pub recipes_count: i64,
}

impl SubscriptionResponse {
    pub fn new(author: UserResponse, recipes: Vec<RecipeShortResponse>, recipes_count: i64) -> Self {
        Self {
            id: author.id,
            email: author.email,
            username: author.username,
            first_name: author.first_name,
            last_name: author.last_name,
            is_subscribed: true,
            recipes,
            recipes_count,
        }
    }
}

/// Query parameters for `GET /users/subscriptions`
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListSubscriptionsQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// How many recipes to embed per author
    #[param(minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub recipes_limit: Option<i64>,
}

/// Query parameters for `POST /users/{id}/subscribe`
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct SubscribeQuery {
    /// How many recipes to embed in the response
    #[param(minimum = 0)]
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub recipes_limit: Option<i64>,
}

/// Resolve the requested recipe preview size, falling back to the configured default
pub fn recipes_limit(requested: Option<i64>, default: i64) -> i64 {
    requested.unwrap_or(default).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipes_limit_defaults_and_floors() {
        assert_eq!(recipes_limit(None, 3), 3);
        assert_eq!(recipes_limit(Some(10), 3), 10);
        assert_eq!(recipes_limit(Some(-1), 3), 0);
    }
}
