//! Authentication and authorization.
//!
//! - [`current_user`]: extractors resolving the caller from a bearer token or session cookie
//! - [`password`]: Argon2id hashing and verification
//! - [`permissions`]: the role/ownership access policy
//! - [`session`]: JWT issuance and verification
//!
//! Login issues a signed JWT that is returned in the body and as an HTTP-only cookie. Tokens are
//! stateless; logout clears the cookie.
//!
//! ```ignore
//! async fn handler(
//!     State(state): State<AppState>,
//!     current_user: RequiresPermission<resource::Recipes, operation::CreateOwn>,
//! ) -> Result<Json<RecipeResponse>> {
//!     ...
//! }
//! ```

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod session;
