use crate::{
    api::models::{
        pagination::PaginatedResponse,
        users::{CurrentUser, ListUsersQuery, SetPasswordRequest, UserCreate, UserResponse},
    },
    auth::{
        password::{self, Argon2Params},
        permissions::{operation, require, resource, Action, Ownership, RequiresPermission},
    },
    db::{
        handlers::{users::UserFilter, Repository, Subscriptions, Users},
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{Resource, UserId},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::PgConnection;

/// Build user DTOs with `is_subscribed` relative to the caller
pub(crate) async fn user_responses(
    conn: &mut PgConnection,
    caller: Option<&CurrentUser>,
    users: Vec<UserDBResponse>,
) -> Result<Vec<UserResponse>> {
    let followed = match caller {
        Some(caller) => {
            let ids: Vec<UserId> = users.iter().map(|u| u.id).collect();
            Subscriptions::new(conn).subscribed_among(caller.id, &ids).await?
        }
        None => Default::default(),
    };

    Ok(users
        .into_iter()
        .map(|user| {
            let is_subscribed = followed.contains(&user.id);
            UserResponse::from(user).with_subscription(is_subscribed)
        })
        .collect())
}

fn user_not_found(id: UserId) -> Error {
    Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    }
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/users",
    request_body = UserCreate,
    tag = "users",
    summary = "Register",
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Invalid data or registration disabled"),
        (status = 409, description = "Email or username already taken"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let native = &state.config.auth.native;
    if !native.enabled || !native.allow_registration {
        return Err(Error::BadRequest {
            message: "Registration is disabled".to_string(),
        });
    }

    let mut errors = request.validate();
    if let Err(Error::Validation { errors: password_errors }) = password::check_length(&request.password, &native.password) {
        errors.extend(password_errors);
    }
    if !errors.is_empty() {
        return Err(Error::Validation { errors });
    }

    let password_hash = password::hash_password(request.password.clone(), Argon2Params::from(&native.password)).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .create(&UserCreateDBRequest::new(request, password_hash))
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// List users
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Page of users", body = PaginatedResponse<UserResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    current_user: Option<CurrentUser>,
) -> Result<Json<PaginatedResponse<UserResponse>>> {
    require(
        state.policy.as_ref(),
        current_user.as_ref(),
        Resource::Users,
        Ownership::NotOwner,
        Action::Read,
    )?;
    let (skip, limit) = query.pagination.params(&state.config.pagination);

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let (users, total_count) = {
        let mut repo = Users::new(&mut tx);
        (repo.list(&UserFilter::new(skip, limit)).await?, repo.count().await?)
    };
    let data = user_responses(&mut tx, current_user.as_ref(), users).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// Get a user profile
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    summary = "Get user",
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User profile", body = UserResponse),
        (status = 404, description = "User not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    current_user: Option<CurrentUser>,
) -> Result<Json<UserResponse>> {
    require(
        state.policy.as_ref(),
        current_user.as_ref(),
        Resource::Users,
        Ownership::of(current_user.as_ref(), id),
        Action::Read,
    )?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).get_by_id(id).await?.ok_or_else(|| user_not_found(id))?;

    let mut responses = user_responses(&mut conn, current_user.as_ref(), vec![user]).await?;
    responses.pop().map(Json).ok_or_else(|| user_not_found(id))
}

/// The authenticated caller's profile
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    summary = "Current user",
    responses(
        (status = 200, description = "Current user profile", body = UserResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_user(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_by_id(current_user.id)
        .await?
        // The token outlived the account
        .ok_or(Error::Unauthenticated { message: None })?;

    Ok(Json(UserResponse::from(user)))
}

/// Change the caller's password
#[utoipa::path(
    post,
    path = "/users/set_password",
    request_body = SetPasswordRequest,
    tag = "users",
    summary = "Set password",
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Wrong current password or invalid new password"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn set_password(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Users, operation::UpdateOwn>,
    Json(request): Json<SetPasswordRequest>,
) -> Result<StatusCode> {
    let password_config = &state.config.auth.native.password;
    password::check_length(&request.new_password, password_config).map_err(|_| {
        Error::invalid(
            "new_password",
            format!(
                "must be between {} and {} characters",
                password_config.min_length, password_config.max_length
            ),
        )
    })?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);
    let user = repo
        .get_by_id(current_user.id)
        .await?
        .ok_or(Error::Unauthenticated { message: None })?;

    let matches = match user.password_hash {
        Some(hash) => password::verify_password(request.current_password, hash).await?,
        None => false,
    };
    if !matches {
        return Err(Error::invalid("current_password", "is incorrect"));
    }

    let new_hash = password::hash_password(request.new_password, Argon2Params::from(password_config)).await?;
    repo.update(
        current_user.id,
        &UserUpdateDBRequest {
            password_hash: Some(new_hash),
            ..Default::default()
        },
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::models::{pagination::PaginatedResponse, users::{Role, UserResponse}};
    use crate::db::handlers::Subscriptions;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    fn registration(username: &str) -> serde_json::Value {
        json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "first_name": "Vasya",
            "last_name": "Pupkin",
            "password": "Qwerty123"
        })
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_and_login(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;

        let response = server.post("/api/users").json(&registration("vasya")).await;
        response.assert_status(StatusCode::CREATED);
        let user: UserResponse = response.json();
        assert_eq!(user.username, "vasya");
        assert!(!user.is_subscribed);

        let login = server
            .post("/api/auth/token/login")
            .json(&json!({ "email": "vasya@example.com", "password": "Qwerty123" }))
            .await;
        login.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_duplicate_is_conflict(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;

        server.post("/api/users").json(&registration("dup")).await.assert_status(StatusCode::CREATED);
        let again = server.post("/api/users").json(&registration("dup")).await;
        again.assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_collects_field_errors(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;

        let response = server
            .post("/api/users")
            .json(&json!({
                "username": "me",
                "email": "broken",
                "first_name": "A",
                "last_name": "B",
                "password": "short"
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: serde_json::Value = response.json();
        let fields: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["username", "email", "password"]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_and_get_users_show_subscription(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let reader = create_test_user(&pool, Role::User).await;
        let author = create_test_user(&pool, Role::User).await;
        {
            let mut conn = pool.acquire().await.unwrap();
            Subscriptions::new(&mut conn).subscribe(reader.id, author.id).await.unwrap();
        }

        let anonymous: PaginatedResponse<UserResponse> = server.get("/api/users").await.json();
        assert_eq!(anonymous.total_count, 2);
        assert!(anonymous.data.iter().all(|u| !u.is_subscribed));

        let (name, value) = auth_header(&reader);
        let page: PaginatedResponse<UserResponse> =
            server.get("/api/users").add_query_param("limit", 1).add_header(name, value).await.json();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.limit, 1);

        let (name, value) = auth_header(&reader);
        let profile: UserResponse = server
            .get(&format!("/api/users/{}", author.id))
            .add_header(name, value)
            .await
            .json();
        assert!(profile.is_subscribed);

        server
            .get(&format!("/api/users/{}", uuid::Uuid::new_v4()))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_me_requires_authentication(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::User).await;

        server.get("/api/users/me").await.assert_status(StatusCode::UNAUTHORIZED);

        let (name, value) = auth_cookie(&user);
        let me: UserResponse = server.get("/api/users/me").add_header(name, value).await.json();
        assert_eq!(me.id, user.id);
        assert_eq!(me.email, user.email);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_set_password(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let user = create_test_user_with_password(&pool, "old-password").await;

        let (name, value) = auth_header(&user);
        server
            .post("/api/users/set_password")
            .add_header(name, value)
            .json(&json!({ "current_password": "wrong-password", "new_password": "new-password" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let (name, value) = auth_header(&user);
        server
            .post("/api/users/set_password")
            .add_header(name, value)
            .json(&json!({ "current_password": "old-password", "new_password": "new-password" }))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server
            .post("/api/auth/token/login")
            .json(&json!({ "email": user.email, "password": "old-password" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .post("/api/auth/token/login")
            .json(&json!({ "email": user.email, "password": "new-password" }))
            .await
            .assert_status_ok();
    }
}
