//! Database record models matching table schemas.
//!
//! This module contains struct definitions that directly correspond to database
//! table rows. These models are used by repositories to return query results
//! and accept insertion/update data.
//!
//! # Design Principles
//!
//! - **Schema Mapping**: Each model struct matches a database table schema
//! - **SQLx Integration**: Row types derive `sqlx::FromRow` for query results
//! - **Separation**: Database models are distinct from API models to allow
//!   independent evolution of storage and API representations
//!
//! # Model Categories
//!
//! - [`users`]: User accounts and roles
//! - [`tags`]: Admin-managed recipe tags
//! - [`ingredients`]: Admin-managed ingredient catalog
//! - [`recipes`]: Recipes, their ingredient lines and the aggregated shopping list
//!
//! # Conversion to API Models
//!
//! Database models implement `From` conversions to API models:
//!
//! ```ignore
//! use foodgram::db::models::tags::TagDBResponse;
//! use foodgram::api::models::tags::TagResponse;
//!
//! let db_tag: TagDBResponse = /* ... */;
//! let api_response: TagResponse = db_tag.into();
//! ```

pub mod ingredients;
pub mod recipes;
pub mod tags;
pub mod users;
