//! HTTP request handlers for all API endpoints.
//!
//! This module contains Axum route handlers organized by resource type.
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Authentication and authorization checks
//! - Business logic execution via database repositories
//! - Response serialization
//!
//! # Handler Modules
//!
//! - [`auth`]: Token login and logout
//! - [`users`]: Registration, profiles and password changes
//! - [`tags`]: Tag reference data
//! - [`ingredients`]: Ingredient catalog and prefix search
//! - [`recipes`]: Recipe CRUD, favorites, shopping cart and the shopping list download
//! - [`subscriptions`]: Following authors
//!
//! # Authentication
//!
//! Handlers take a [`crate::api::models::users::CurrentUser`] (or `Option<CurrentUser>` for public
//! reads) resolved from a bearer token or the session cookie. Checks that depend only on the role
//! use [`crate::auth::permissions::RequiresPermission`]; checks that depend on who owns a resource
//! call [`crate::auth::permissions::require`] once the owner is known.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which automatically converts to
//! appropriate HTTP status codes and JSON error responses.

pub mod auth;
pub mod ingredients;
pub mod recipes;
pub mod subscriptions;
pub mod tags;
pub mod users;
