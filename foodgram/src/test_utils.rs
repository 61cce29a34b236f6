//! Test utilities for integration testing (available with `test-utils` feature).

use crate::api::models::users::{CurrentUser, Role};
use crate::auth::{password, session};
use crate::config::{AuthConfig, Config, MediaConfig, NativeAuthConfig, PasswordConfig, PoolSettings, SessionConfig};
use crate::db::{
    handlers::{Ingredients, Recipes, Repository, Tags, Users},
    models::{
        ingredients::{IngredientCreateDBRequest, IngredientDBResponse},
        recipes::{RecipeCreateDBRequest, RecipeDBResponse, RecipeIngredientDBRequest},
        tags::{TagCreateDBRequest, TagDBResponse},
        users::{UserCreateDBRequest, UserDBResponse},
    },
};
use crate::types::{IngredientId, TagId, UserId};
use crate::AppState;
use axum::http::{header, HeaderName, HeaderValue};
use axum_test::TestServer;
use sqlx::PgPool;
use uuid::Uuid;

/// A 1x1 transparent PNG, base64 encoded
pub const TEST_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub fn test_image_data_uri() -> String {
    format!("data:image/png;base64,{TEST_PNG_BASE64}")
}

pub async fn create_test_app(pool: PgPool) -> TestServer {
    let config = create_test_config();

    let app = crate::Application::new_with_pool(config, pool)
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

pub fn create_test_state(pool: PgPool) -> AppState {
    let config = create_test_config();
    AppState::builder()
        .db(pool)
        .media(crate::media::MediaStorage::new(&config.media))
        .config(config)
        .build()
}

pub fn create_test_config() -> Config {
    let media_root = std::env::temp_dir().join(format!("foodgram-test-media-{}", std::process::id()));

    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: None,
        database: crate::config::DatabaseConfig {
            // Will get overridden by the pool handed to the application
            url: "Something".to_string(),
            pool: PoolSettings {
                max_connections: 2,
                min_connections: 0,
                ..Default::default()
            },
        },
        admin_email: "admin@test.com".to_string(),
        admin_username: "admin".to_string(),
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        auth: AuthConfig {
            native: NativeAuthConfig {
                password: PasswordConfig {
                    argon2_memory_kib: 128,
                    argon2_iterations: 1,
                    argon2_parallelism: 1,
                    ..Default::default()
                },
                session: SessionConfig {
                    cookie_secure: false,
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        },
        media: MediaConfig {
            root: media_root,
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn insert_user(pool: &PgPool, prefix: &str, role: Role, password_hash: Option<String>) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut users_repo = Users::new(&mut conn);
    let username = format!("{prefix}_{}", Uuid::new_v4().simple());

    let user_create = UserCreateDBRequest {
        email: format!("{username}@example.com"),
        username,
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        password_hash,
        role,
    };

    users_repo.create(&user_create).await.expect("Failed to create test user")
}

pub async fn create_test_user(pool: &PgPool, role: Role) -> UserDBResponse {
    insert_user(pool, "testuser", role, None).await
}

pub async fn create_test_admin_user(pool: &PgPool) -> UserDBResponse {
    insert_user(pool, "testadmin", Role::Admin, None).await
}

/// A regular user who can log in with `password`
pub async fn create_test_user_with_password(pool: &PgPool, password: &str) -> UserDBResponse {
    let params = password::Argon2Params::from(&create_test_config().auth.native.password);
    let hash = password::hash_string_with_params(password, Some(params)).expect("Failed to hash password");
    insert_user(pool, "testuser", Role::User, Some(hash)).await
}

/// `Authorization` header carrying a session token for `user`
pub fn auth_header(user: &UserDBResponse) -> (HeaderName, HeaderValue) {
    let token = session::create_session_token(&CurrentUser::from(user.clone()), &create_test_config())
        .expect("Failed to create session token");
    let value = HeaderValue::from_str(&format!("Bearer {token}")).expect("Invalid header value");
    (header::AUTHORIZATION, value)
}

/// `Cookie` header carrying a session token for `user`
pub fn auth_cookie(user: &UserDBResponse) -> (HeaderName, HeaderValue) {
    let config = create_test_config();
    let token =
        session::create_session_token(&CurrentUser::from(user.clone()), &config).expect("Failed to create session token");
    let value = HeaderValue::from_str(&format!("{}={token}", config.auth.native.session.cookie_name))
        .expect("Invalid header value");
    (header::COOKIE, value)
}

pub async fn create_test_tag(pool: &PgPool, slug: &str) -> TagDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let color = Uuid::new_v4().simple().to_string()[..6].to_uppercase();

    Tags::new(&mut conn)
        .create(&TagCreateDBRequest {
            name: slug.to_string(),
            color: format!("#{color}"),
            slug: slug.to_string(),
        })
        .await
        .expect("Failed to create test tag")
}

pub async fn create_test_ingredient(pool: &PgPool, name: &str, measurement_unit: &str) -> IngredientDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");

    Ingredients::new(&mut conn)
        .create(&IngredientCreateDBRequest {
            name: name.to_string(),
            measurement_unit: measurement_unit.to_string(),
        })
        .await
        .expect("Failed to create test ingredient")
}

/// A recipe with the given tags and `(ingredient, amount)` lines
pub async fn create_test_recipe_with(
    pool: &PgPool,
    author_id: UserId,
    tags: &[TagId],
    ingredients: &[(IngredientId, i32)],
) -> RecipeDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");

    Recipes::new(&mut conn)
        .create(&RecipeCreateDBRequest {
            author_id,
            name: format!("Test recipe {}", &Uuid::new_v4().simple().to_string()[..8]),
            image: "recipes/images/test.png".to_string(),
            text: "Mix everything together.".to_string(),
            cooking_time: 10,
            tags: tags.to_vec(),
            ingredients: ingredients
                .iter()
                .map(|&(ingredient_id, amount)| RecipeIngredientDBRequest { ingredient_id, amount })
                .collect(),
        })
        .await
        .expect("Failed to create test recipe")
}

/// A recipe with a fresh tag and a single fresh ingredient
pub async fn create_test_recipe(pool: &PgPool, author_id: UserId) -> RecipeDBResponse {
    let suffix = Uuid::new_v4().simple().to_string();
    let tag = create_test_tag(pool, &format!("tag-{}", &suffix[..12])).await;
    let ingredient = create_test_ingredient(pool, &format!("ingredient {}", &suffix[..12]), "g").await;

    create_test_recipe_with(pool, author_id, &[tag.id], &[(ingredient.id, 100)]).await
}
