use crate::{
    api::models::{
        auth::{LoginRequest, LoginResponse, LogoutResponse, TokenResponse},
        users::CurrentUser,
    },
    auth::{password, session},
    db::handlers::Users,
    errors::{Error, Result},
    AppState,
};
use axum::{extract::State, Json};

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    }
}

/// Exchange email and password for a session token
#[utoipa::path(
    post,
    path = "/auth/token/login",
    request_body = LoginRequest,
    tag = "authentication",
    summary = "Log in",
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Native authentication is disabled"),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<LoginResponse> {
    if !state.config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let user = Users::new(&mut pool_conn)
        .get_user_by_email(request.email.trim())
        .await?
        .ok_or_else(invalid_credentials)?;

    let password_hash = user.password_hash.clone().ok_or_else(invalid_credentials)?;

    if !password::verify_password(request.password, password_hash).await? {
        return Err(invalid_credentials());
    }

    let current_user = CurrentUser::from(user);
    let token = session::create_session_token(&current_user, &state.config)?;
    let cookie = session::session_cookie(&token, &state.config);

    Ok(LoginResponse {
        token: TokenResponse { auth_token: token },
        cookie,
    })
}

/// Clear the session cookie. Tokens are stateless and simply expire.
#[utoipa::path(
    post,
    path = "/auth/token/logout",
    tag = "authentication",
    summary = "Log out",
    responses(
        (status = 204, description = "Logged out"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, _current_user: CurrentUser) -> Result<LogoutResponse> {
    Ok(LogoutResponse {
        cookie: session::expired_session_cookie(&state.config),
    })
}
