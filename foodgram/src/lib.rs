//! # foodgram: a recipe sharing backend
//!
//! `foodgram` is the HTTP backend of a recipe sharing site. Users publish recipes made of catalog
//! ingredients and tags, follow other authors, keep favorites, and collect recipes in a shopping
//! cart that can be downloaded as one consolidated shopping list.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for all persistence. Uploaded recipe images live on the local filesystem and
//! are served back under a configurable URL prefix.
//!
//! ### Request Flow
//!
//! Every API request is served under `/api`. Handlers resolve the caller from a bearer token or the
//! session cookie (see [`auth::current_user`]), ask the [`auth::permissions::AccessPolicy`] whether
//! the caller may perform the action, and then talk to PostgreSQL through the repositories in
//! [`db::handlers`]. Responses are built from separate read models in [`api::models`].
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) holds the route handlers and the request/response models. Write
//! shapes carry ids; read shapes nest full objects plus per-caller flags such as `is_favorited`.
//!
//! The **authentication layer** ([`auth`]) issues stateless JWT session tokens at login, hashes
//! passwords with Argon2, and decides access with a pure `(role, ownership, action)` policy.
//!
//! The **database layer** ([`db`]) uses the repository pattern. Recipe writes replace their tag and
//! ingredient sets inside one transaction, and the shopping list is aggregated in SQL.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use foodgram::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = foodgram::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     foodgram::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! The application requires a PostgreSQL database and automatically runs migrations on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! foodgram::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod media;
mod openapi;
pub mod shopping_list;
pub mod telemetry;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::{
    api::models::users::Role,
    auth::{
        password::{self, Argon2Params},
        permissions::{AccessPolicy, RolePolicy},
    },
    config::CorsOrigin,
    db::handlers::{Repository, Users},
    db::models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    media::MediaStorage,
    openapi::ApiDoc,
};
use axum::extract::DefaultBodyLimit;
use axum::http::{self, HeaderValue, Method};
use axum::{
    Json, Router,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, info, instrument, Level};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{IngredientId, RecipeId, TagId, UserId};

/// Application state shared across all request handlers.
///
/// # Fields
///
/// - `db`: PostgreSQL connection pool
/// - `config`: Application configuration loaded from file and environment
/// - `policy`: Access decisions; [`RolePolicy`] unless a test swaps it
/// - `media`: Storage for uploaded recipe images
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .media(MediaStorage::new(&config.media))
///     .config(config)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    #[builder(default = Arc::new(RolePolicy) as Arc<dyn AccessPolicy>)]
    pub policy: Arc<dyn AccessPolicy>,
    pub media: MediaStorage,
}

/// Get the foodgram database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create or refresh the initial admin user.
///
/// Idempotent: an existing account with `admin_email` is promoted to [`Role::Admin`] and gets the
/// configured password. Nothing happens when `admin_password` is not configured.
///
/// Returns the admin's user ID when one was created or refreshed.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(config: &Config, db: &PgPool) -> anyhow::Result<Option<UserId>> {
    let Some(password) = config.admin_password.as_deref() else {
        debug!("No admin password configured, skipping initial admin user");
        return Ok(None);
    };

    let params = Argon2Params::from(&config.auth.native.password);
    let password_hash = password::hash_password(password.to_string(), params).await?;

    let mut tx = db.begin().await?;
    let mut user_repo = Users::new(&mut tx);

    let admin_id = match user_repo.get_user_by_email(&config.admin_email).await? {
        Some(existing) => {
            user_repo
                .update(
                    existing.id,
                    &UserUpdateDBRequest {
                        password_hash: Some(password_hash),
                        role: Some(Role::Admin),
                        ..Default::default()
                    },
                )
                .await?;
            existing.id
        }
        None => {
            let created = user_repo
                .create(&UserCreateDBRequest {
                    username: config.admin_username.clone(),
                    email: config.admin_email.clone(),
                    first_name: "Admin".to_string(),
                    last_name: "Admin".to_string(),
                    password_hash: Some(password_hash),
                    role: Role::Admin,
                })
                .await?;
            info!("Created initial admin user {}", config.admin_username);
            created.id
        }
    };

    tx.commit().await?;
    Ok(Some(admin_id))
}

/// Connect to the database, run migrations, and make sure the admin user exists
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    info!("Connecting to database");
    let pool = config.database.pool.pool_options().connect(&config.database.url).await?;
    prepare_database(config, &pool).await?;
    Ok(pool)
}

async fn prepare_database(config: &Config, pool: &PgPool) -> anyhow::Result<()> {
    migrator().run(pool).await?;
    create_initial_admin_user(config, pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {}", e))?;
    Ok(())
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.security.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .expose_headers(vec![http::header::CONTENT_DISPOSITION]);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Largest JSON body accepted: a base64 image of `max_image_bytes` plus room for the rest
fn body_limit(config: &Config) -> usize {
    config.media.max_image_bytes / 3 * 4 + 64 * 1024
}

/// Build the main application router with all endpoints and middleware.
///
/// - `/healthz` liveness probe
/// - `/api/*` JSON API, with the OpenAPI document at `/api/openapi.json` and docs at `/api/docs`
/// - uploaded media under `media.url_prefix`
/// - CORS and tracing middleware
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers::{auth, ingredients, recipes, subscriptions, tags, users};

    let api_routes = Router::new()
        // Authentication
        .route("/auth/token/login", post(auth::login))
        .route("/auth/token/logout", post(auth::logout))
        // Users and subscriptions
        .route("/users", get(users::list_users).post(users::register))
        .route("/users/me", get(users::get_current_user))
        .route("/users/set_password", post(users::set_password))
        .route("/users/subscriptions", get(subscriptions::list_subscriptions))
        .route("/users/{id}", get(users::get_user))
        .route(
            "/users/{id}/subscribe",
            post(subscriptions::subscribe).delete(subscriptions::unsubscribe),
        )
        // Reference data
        .route("/tags", get(tags::list_tags).post(tags::create_tag))
        .route(
            "/tags/{id}",
            get(tags::get_tag).patch(tags::update_tag).delete(tags::delete_tag),
        )
        .route(
            "/ingredients",
            get(ingredients::list_ingredients).post(ingredients::create_ingredient),
        )
        .route(
            "/ingredients/{id}",
            get(ingredients::get_ingredient).delete(ingredients::delete_ingredient),
        )
        // Recipes
        .route("/recipes", get(recipes::list_recipes).post(recipes::create_recipe))
        .route("/recipes/download_shopping_cart", get(recipes::download_shopping_cart))
        .route(
            "/recipes/{id}",
            get(recipes::get_recipe)
                .patch(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route(
            "/recipes/{id}/favorite",
            post(recipes::add_favorite).delete(recipes::remove_favorite),
        )
        .route(
            "/recipes/{id}/shopping_cart",
            post(recipes::add_to_shopping_cart).delete(recipes::remove_from_shopping_cart),
        )
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .layer(DefaultBodyLimit::max(body_limit(&state.config)))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", api_routes)
        .nest_service(&state.config.media.url_prefix, ServeDir::new(state.media.root()))
        .merge(Scalar::with_url("/api/docs", ApiDoc::openapi()));

    // Outermost first: trace every request, then answer CORS preflights
    let layers = ServiceBuilder::new()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(create_cors_layer(&state.config)?);

    Ok(router.layer(layers))
}

/// The assembled service: state, router and the pool it owns.
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting foodgram with configuration: {:#?}", config);
        let pool = setup_database(&config).await?;
        Self::assemble(config, pool).await
    }

    /// Create an application on an existing pool. Migrations and the admin user are still applied.
    pub async fn new_with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        prepare_database(&config, &pool).await?;
        Self::assemble(config, pool).await
    }

    async fn assemble(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        let media = MediaStorage::new(&config.media);
        tokio::fs::create_dir_all(media.root()).await?;

        let app_state = AppState::builder().db(pool.clone()).config(config.clone()).media(media).build();
        let router = build_router(&app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Foodgram listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
