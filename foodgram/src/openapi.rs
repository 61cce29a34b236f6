//! OpenAPI documentation for the `/api` surface.
//!
//! Handler paths are declared relative to `/api`; the document carries `/api` as its server so
//! clients generated from it resolve the real URLs.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;
use crate::errors::FieldError;

/// Security schemes: a bearer session token, or the session cookie set at login.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token from `POST /api/auth/token/login`. Send it as \
                            `Authorization: Bearer <token>` (the `Token` prefix is accepted too).",
                        ))
                        .build(),
                ),
            );
            components.security_schemes.insert(
                "CookieAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("foodgram_session"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    servers((url = "/api", description = "Foodgram API")),
    paths(
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::users::register,
        api::handlers::users::list_users,
        api::handlers::users::get_user,
        api::handlers::users::get_current_user,
        api::handlers::users::set_password,
        api::handlers::subscriptions::list_subscriptions,
        api::handlers::subscriptions::subscribe,
        api::handlers::subscriptions::unsubscribe,
        api::handlers::tags::list_tags,
        api::handlers::tags::get_tag,
        api::handlers::tags::create_tag,
        api::handlers::tags::update_tag,
        api::handlers::tags::delete_tag,
        api::handlers::ingredients::list_ingredients,
        api::handlers::ingredients::get_ingredient,
        api::handlers::ingredients::create_ingredient,
        api::handlers::ingredients::delete_ingredient,
        api::handlers::recipes::list_recipes,
        api::handlers::recipes::get_recipe,
        api::handlers::recipes::create_recipe,
        api::handlers::recipes::update_recipe,
        api::handlers::recipes::delete_recipe,
        api::handlers::recipes::add_favorite,
        api::handlers::recipes::remove_favorite,
        api::handlers::recipes::add_to_shopping_cart,
        api::handlers::recipes::remove_from_shopping_cart,
        api::handlers::recipes::download_shopping_cart,
    ),
    components(
        schemas(
            FieldError,
            api::models::auth::LoginRequest,
            api::models::auth::TokenResponse,
            api::models::users::Role,
            api::models::users::UserCreate,
            api::models::users::UserResponse,
            api::models::users::SetPasswordRequest,
            api::models::subscriptions::SubscriptionResponse,
            api::models::tags::TagCreate,
            api::models::tags::TagUpdate,
            api::models::tags::TagResponse,
            api::models::ingredients::IngredientCreate,
            api::models::ingredients::IngredientResponse,
            api::models::recipes::RecipeIngredientInput,
            api::models::recipes::RecipeCreate,
            api::models::recipes::RecipeUpdate,
            api::models::recipes::RecipeIngredientResponse,
            api::models::recipes::RecipeResponse,
            api::models::recipes::RecipeShortResponse,
        )
    ),
    tags(
        (name = "authentication", description = "Token login and logout. The token is also set as an HttpOnly session cookie."),
        (name = "users", description = "Registration, profiles and password changes."),
        (name = "subscriptions", description = "Follow authors and list them with previews of their newest recipes."),
        (name = "tags", description = "Tags used to categorise recipes. Writes are admin-only."),
        (name = "ingredients", description = "The ingredient catalog. Search with `?name=<prefix>`."),
        (name = "recipes", description = "Recipes with tags and ingredient amounts. Filter by `author`, repeated `tags`, `is_favorited` and `is_in_shopping_cart`."),
        (name = "favorites", description = "The caller's favorite recipes."),
        (name = "shopping cart", description = "The caller's shopping cart and the consolidated shopping list download.

The download sums ingredient amounts across every recipe in the cart and returns one `name - totalunit` line per ingredient, ordered by name."),
    ),
    info(
        title = "Foodgram API",
        version = "1.0.0",
        description = "Share recipes, follow authors, keep favorites and build a shopping list.

## Authentication

Log in with `POST /api/auth/token/login`. Send the returned token as `Authorization: Bearer <token>`,
or rely on the session cookie set by the same call. Read endpoints work anonymously.

## Errors

Validation failures return `400` with a `message` and a list of `errors`, one per offending field.
Nothing is persisted when a submission is rejected.",
    ),
)]
pub struct ApiDoc;
