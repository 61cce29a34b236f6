//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs (UserId, RecipeId, etc.)
//! - Resource and operation enums used by the access policy
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`UserId`]: User account identifier
//! - [`RecipeId`]: Recipe identifier
//! - [`TagId`]: Tag identifier
//! - [`IngredientId`]: Ingredient catalog identifier
//!
//! # Permission System
//!
//! - [`Resource`]: What entity type is being accessed (Recipes, Tags, Favorites, etc.)
//! - [`Operation`]: What action is being performed, scoped to *all* or *own* entities
//! - [`Permission`]: Authorization requirement reported back in errors
//!
//! The actual allow/deny decision lives in [`crate::auth::permissions`].

use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type RecipeId = Uuid;
pub type TagId = Uuid;
pub type IngredientId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

// Operations that can be performed on resources
// *-All means unrestricted access, *-Own means restricted to own resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    CreateOwn,
    ReadAll,
    ReadOwn,
    UpdateAll,
    UpdateOwn,
    DeleteAll,
    DeleteOwn,
}

// Resources that can be operated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Tags,
    Ingredients,
    Recipes,
    Favorites,
    ShoppingCart,
    Subscriptions,
}

// Permission types for authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
    /// Logical combinators
    Any(Vec<Permission>),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll | Operation::CreateOwn => write!(f, "Create"),
            Operation::ReadAll | Operation::ReadOwn => write!(f, "Read"),
            Operation::UpdateAll | Operation::UpdateOwn => write!(f, "Update"),
            Operation::DeleteAll | Operation::DeleteOwn => write!(f, "Delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Users => "users",
            Resource::Tags => "tags",
            Resource::Ingredients => "ingredients",
            Resource::Recipes => "recipes",
            Resource::Favorites => "favorites",
            Resource::ShoppingCart => "shopping cart",
            Resource::Subscriptions => "subscriptions",
        };
        write!(f, "{name}")
    }
}
