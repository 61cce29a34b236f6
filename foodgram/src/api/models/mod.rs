//! API request and response data models.
//!
//! These are the shapes that cross the HTTP boundary. Each resource keeps its write shapes
//! (`*Create`, `*Update`) separate from its read shapes (`*Response`), and most models
//! convert from their database counterparts in [`crate::db::models`].
//!
//! - [`auth`]: Login and logout payloads
//! - [`users`]: Registration, profiles, roles and the authenticated caller
//! - [`tags`]: Tag reference data
//! - [`ingredients`]: Ingredient catalog
//! - [`recipes`]: Recipe read and write shapes, list filters
//! - [`subscriptions`]: Followed authors with recipe previews
//! - [`pagination`]: Shared `skip`/`limit` handling

pub mod auth;
pub mod ingredients;
pub mod pagination;
pub mod recipes;
pub mod subscriptions;
pub mod tags;
pub mod users;
