//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Everything is served under `/api`:
//!
//! - **Authentication** (`/api/auth/token/*`): Token login and logout
//! - **Users** (`/api/users/*`): Registration, profiles, password changes and subscriptions
//! - **Tags** (`/api/tags/*`): Tag reference data
//! - **Ingredients** (`/api/ingredients/*`): Ingredient catalog with name prefix search
//! - **Recipes** (`/api/recipes/*`): Recipes, favorites, shopping cart and the shopping list download
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`.
//! API documentation is available at `/api/docs` when the server is running.

pub mod handlers;
pub mod models;
