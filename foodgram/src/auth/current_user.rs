//! Extractors for the authenticated caller.
//!
//! Two credential sources are accepted:
//! - `Authorization: Bearer <jwt>` (or `Token <jwt>`). A token that fails verification is an
//!   error, the caller asked to be someone and could not prove it.
//! - The session cookie set at login. An invalid or expired cookie is ignored, so a stale
//!   browser session degrades to anonymous access instead of locking the caller out.
//!
//! Handlers that require a user take [`CurrentUser`]; public handlers take
//! `Option<CurrentUser>`, which is `None` when no usable credentials were sent.

use crate::{
    api::models::users::CurrentUser,
    auth::session,
    config::Config,
    errors::{Error, Result},
    AppState,
};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Extract user from the Authorization header if present
/// Returns:
/// - None: No Authorization header, or a scheme we do not handle
/// - Some(Ok(user)): Valid token found and verified
/// - Some(Err(error)): Token present but invalid
#[instrument(skip(parts, config))]
fn try_bearer_auth(parts: &Parts, config: &Config) -> Option<Result<CurrentUser>> {
    let auth_header = parts.headers.get(header::AUTHORIZATION)?;

    let auth_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }))
        }
    };

    let token = auth_str.strip_prefix("Bearer ").or_else(|| auth_str.strip_prefix("Token "))?;
    Some(session::verify_session_token(token.trim(), config))
}

/// Extract user from the JWT session cookie if present and valid
#[instrument(skip(parts, config))]
fn try_jwt_session_auth(parts: &Parts, config: &Config) -> Option<Result<CurrentUser>> {
    let cookie_header = parts.headers.get(header::COOKIE)?;

    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid cookie header: {e}"),
            }))
        }
    };
    let cookie_name = &config.auth.native.session.cookie_name;

    for cookie in cookie_str.split(';') {
        if let Some((name, value)) = cookie.trim().split_once('=') {
            if name == cookie_name {
                match session::verify_session_token(value, config) {
                    Ok(user) => return Some(Ok(user)),
                    // Expired cookies are expected; keep looking
                    Err(_) => continue,
                }
            }
        }
    }
    None
}

/// Resolve the caller, if any credentials were supplied
async fn resolve(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>> {
    if !state.config.auth.native.enabled {
        trace!("Native authentication disabled");
        return Ok(None);
    }

    match try_bearer_auth(parts, &state.config) {
        Some(Ok(user)) => {
            debug!("Found bearer authenticated user: {}", user.id);
            return Ok(Some(user));
        }
        Some(Err(e)) => {
            trace!("Bearer authentication failed: {:?}", e);
            return Err(e);
        }
        None => trace!("No bearer token supplied"),
    }

    match try_jwt_session_auth(parts, &state.config) {
        Some(Ok(user)) => {
            debug!("Found JWT session authenticated user: {}", user.id);
            Ok(Some(user))
        }
        Some(Err(e)) => Err(e),
        None => {
            trace!("No session cookie supplied");
            Ok(None)
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        resolve(parts, state).await?.ok_or(Error::Unauthenticated { message: None })
    }
}

impl OptionalFromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Option<Self>> {
        resolve(parts, state).await
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::users::{CurrentUser, Role},
        auth::session,
        errors::Error,
        test_utils::{create_test_config, create_test_state},
    };
    use axum::extract::{FromRequestParts, OptionalFromRequestParts};
    use axum::http::request::Parts;
    use sqlx::PgPool;
    use uuid::Uuid;

    fn parts_with_header(header_name: &str, header_value: &str) -> Parts {
        let request = axum::http::Request::builder()
            .uri("http://localhost/test")
            .header(header_name, header_value)
            .body(())
            .unwrap();
        request.into_parts().0
    }

    fn bare_parts() -> Parts {
        axum::http::Request::builder()
            .uri("http://localhost/test")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn someone() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "cook".to_string(),
            email: "cook@example.com".to_string(),
            role: Role::User,
        }
    }

    #[sqlx::test]
    async fn test_bearer_token_extraction(pool: PgPool) {
        let state = create_test_state(pool);
        let user = someone();
        let token = session::create_session_token(&user, &state.config).unwrap();

        for scheme in ["Bearer", "Token"] {
            let mut parts = parts_with_header("authorization", &format!("{scheme} {token}"));
            let extracted = <CurrentUser as FromRequestParts<_>>::from_request_parts(&mut parts, &state).await.unwrap();
            assert_eq!(extracted.id, user.id);
            assert_eq!(extracted.role, Role::User);
        }
    }

    #[sqlx::test]
    async fn test_invalid_bearer_token_is_rejected(pool: PgPool) {
        let state = create_test_state(pool);
        let mut parts = parts_with_header("authorization", "Bearer not-a-jwt");

        let result = <CurrentUser as OptionalFromRequestParts<_>>::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result.unwrap_err(), Error::Unauthenticated { .. }));
    }

    #[sqlx::test]
    async fn test_session_cookie_extraction(pool: PgPool) {
        let state = create_test_state(pool);
        let user = someone();
        let token = session::create_session_token(&user, &state.config).unwrap();
        let cookie = format!("other=1; {}={token}", state.config.auth.native.session.cookie_name);

        let mut parts = parts_with_header("cookie", &cookie);
        let extracted = <CurrentUser as FromRequestParts<_>>::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(extracted.id, user.id);
    }

    #[sqlx::test]
    async fn test_stale_cookie_degrades_to_anonymous(pool: PgPool) {
        let state = create_test_state(pool);
        let cookie = format!("{}=garbage", state.config.auth.native.session.cookie_name);

        let mut parts = parts_with_header("cookie", &cookie);
        let optional = <CurrentUser as OptionalFromRequestParts<_>>::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(optional.is_none());

        let required = <CurrentUser as FromRequestParts<_>>::from_request_parts(&mut parts, &state).await;
        assert!(matches!(required.unwrap_err(), Error::Unauthenticated { .. }));
    }

    #[sqlx::test]
    async fn test_no_credentials(pool: PgPool) {
        let state = create_test_state(pool);
        let mut parts = bare_parts();

        let optional = <CurrentUser as OptionalFromRequestParts<_>>::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(optional.is_none());
        assert!(<CurrentUser as FromRequestParts<_>>::from_request_parts(&mut parts, &state).await.is_err());
    }

    #[sqlx::test]
    async fn test_token_signed_with_other_secret(pool: PgPool) {
        let state = create_test_state(pool);
        let mut other = create_test_config();
        other.secret_key = Some("a-different-secret".to_string());
        let token = session::create_session_token(&someone(), &other).unwrap();

        let mut parts = parts_with_header("authorization", &format!("Bearer {token}"));
        assert!(<CurrentUser as FromRequestParts<_>>::from_request_parts(&mut parts, &state).await.is_err());
    }
}
