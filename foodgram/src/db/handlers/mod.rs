//! Repository implementations for database access.
//!
//! This module provides repository structs for each major entity in the system.
//! Repositories follow a consistent pattern and, where the entity has a full CRUD
//! lifecycle, implement the [`Repository`] trait.
//!
//! # Design Pattern
//!
//! Each repository:
//! - Wraps a SQLx connection or transaction
//! - Provides strongly-typed operations
//! - Handles query construction and parameter binding
//! - Returns domain models from [`crate::db::models`]
//!
//! # Available Repositories
//!
//! - [`Users`]: User accounts and authentication lookups
//! - [`Tags`]: Tag reference data
//! - [`Ingredients`]: Ingredient catalog and prefix search
//! - [`Recipes`]: Recipes with transactional replacement of tags and ingredients
//! - [`RecipeLists`]: Favorites and shopping cart membership
//! - [`Subscriptions`]: Follower -> author relationships
//! - [`ShoppingList`]: Aggregated shopping list for a user's cart
//!
//! # Common Pattern
//!
//! ```ignore
//! use foodgram::db::handlers::{Recipes, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let mut repo = Recipes::new(&mut tx);
//!
//!     let recipe = repo.get_by_id(recipe_id).await?;
//!
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod ingredients;
pub mod recipe_lists;
pub mod recipes;
pub mod repository;
pub mod shopping_list;
pub mod subscriptions;
pub mod tags;
pub mod users;

pub use ingredients::Ingredients;
pub use recipe_lists::{RecipeListKind, RecipeLists};
pub use recipes::Recipes;
pub use repository::Repository;
pub use shopping_list::ShoppingList;
pub use subscriptions::Subscriptions;
pub use tags::Tags;
pub use users::Users;
