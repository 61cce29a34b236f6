use crate::{
    api::{
        handlers::users::user_responses,
        models::{
            pagination::PaginatedResponse,
            recipes::{ListRecipesQuery, RecipeCreate, RecipeIngredientInput, RecipeResponse, RecipeShortResponse, RecipeUpdate},
            users::{CurrentUser, UserResponse},
        },
    },
    auth::permissions::{operation, require, resource, Action, Ownership, RequiresPermission},
    db::{
        errors::DbError,
        handlers::{recipes::RecipeFilter, Ingredients, RecipeListKind, RecipeLists, Recipes, Repository, ShoppingList, Tags, Users},
        models::recipes::{RecipeCreateDBRequest, RecipeDBResponse, RecipeUpdateDBRequest},
    },
    errors::{Error, FieldError, Result},
    shopping_list,
    types::{IngredientId, RecipeId, Resource, TagId, UserId},
    AppState,
};
use axum::{
    extract::{Path, Query, RawQuery, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgConnection;
use std::collections::{HashMap, HashSet};
use tracing::info;

fn recipe_not_found(id: RecipeId) -> Error {
    Error::NotFound {
        resource: "Recipe".to_string(),
        id: id.to_string(),
    }
}

/// Build read DTOs: authors (with the caller's subscription flag), image URLs and the caller's
/// favorite/cart flags, in the order given.
async fn recipe_responses(
    conn: &mut PgConnection,
    state: &AppState,
    caller: Option<&CurrentUser>,
    recipes: Vec<RecipeDBResponse>,
) -> Result<Vec<RecipeResponse>> {
    let author_ids: Vec<UserId> = recipes
        .iter()
        .map(|r| r.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let authors = Users::new(conn).get_bulk(author_ids).await?.into_values().collect();
    let authors: HashMap<UserId, UserResponse> = user_responses(conn, caller, authors)
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    let recipe_ids: Vec<RecipeId> = recipes.iter().map(|r| r.id).collect();
    let (favorited, in_cart) = match caller {
        Some(caller) => (
            RecipeLists::favorites(conn).containing(caller.id, &recipe_ids).await?,
            RecipeLists::shopping_cart(conn).containing(caller.id, &recipe_ids).await?,
        ),
        None => (HashSet::new(), HashSet::new()),
    };

    recipes
        .into_iter()
        .map(|recipe| {
            let author = authors.get(&recipe.author_id).cloned().ok_or_else(|| Error::Internal {
                operation: format!("load author {} of recipe {}", recipe.author_id, recipe.id),
            })?;
            let flags = (favorited.contains(&recipe.id), in_cart.contains(&recipe.id));
            let image_url = state.media.url_for(&recipe.image);
            Ok(RecipeResponse::new(recipe, author, image_url).with_flags(flags.0, flags.1))
        })
        .collect()
}

async fn recipe_response(
    conn: &mut PgConnection,
    state: &AppState,
    caller: Option<&CurrentUser>,
    recipe: RecipeDBResponse,
) -> Result<RecipeResponse> {
    let id = recipe.id;
    recipe_responses(conn, state, caller, vec![recipe])
        .await?
        .pop()
        .ok_or_else(|| recipe_not_found(id))
}

/// Reject submissions that reference tags or ingredients missing from the catalog
async fn check_references(conn: &mut PgConnection, tags: &[TagId], ingredients: &[RecipeIngredientInput]) -> Result<()> {
    let mut errors = Vec::new();

    let known_tags = Tags::new(conn).get_bulk(tags.to_vec()).await?;
    for (i, tag) in tags.iter().enumerate() {
        if !known_tags.contains_key(tag) {
            errors.push(FieldError::new(format!("tags[{i}]"), format!("tag {tag} does not exist")));
        }
    }

    let ingredient_ids: Vec<IngredientId> = ingredients.iter().map(|i| i.id).collect();
    let known_ingredients = Ingredients::new(conn).get_bulk(ingredient_ids).await?;
    for (i, line) in ingredients.iter().enumerate() {
        if !known_ingredients.contains_key(&line.id) {
            errors.push(FieldError::new(
                format!("ingredients[{i}].id"),
                format!("ingredient {} does not exist", line.id),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation { errors })
    }
}

/// Author of an existing recipe, checked against the policy for `action`
async fn authorize_recipe(
    conn: &mut PgConnection,
    state: &AppState,
    caller: &CurrentUser,
    id: RecipeId,
    action: Action,
) -> Result<()> {
    let author_id = Recipes::new(conn).author_of(id).await?.ok_or_else(|| recipe_not_found(id))?;
    require(
        state.policy.as_ref(),
        Some(caller),
        Resource::Recipes,
        Ownership::of(Some(caller), author_id),
        action,
    )
}

/// List recipes, newest first
#[utoipa::path(
    get,
    path = "/recipes",
    tag = "recipes",
    summary = "List recipes",
    params(
        ListRecipesQuery,
        ("tags" = Option<Vec<String>>, Query, description = "Tag slugs; repeat to match any of several"),
    ),
    responses(
        (status = 200, description = "Page of recipes", body = PaginatedResponse<RecipeResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_recipes(
    State(state): State<AppState>,
    Query(query): Query<ListRecipesQuery>,
    RawQuery(raw_query): RawQuery,
    current_user: Option<CurrentUser>,
) -> Result<Json<PaginatedResponse<RecipeResponse>>> {
    require(
        state.policy.as_ref(),
        current_user.as_ref(),
        Resource::Recipes,
        Ownership::NotOwner,
        Action::Read,
    )?;
    let query = query.with_tags(raw_query.as_deref());
    let (skip, limit) = query.pagination.params(&state.config.pagination);

    let caller_id = current_user.as_ref().map(|u| u.id);
    let filter = RecipeFilter {
        author_id: query.author,
        tag_slugs: query.tags.clone(),
        favorited_by: caller_id.filter(|_| query.favorited_only()),
        in_cart_of: caller_id.filter(|_| query.in_shopping_cart_only()),
        ..RecipeFilter::new(skip, limit)
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let (recipes, total_count) = {
        let mut repo = Recipes::new(&mut tx);
        (repo.list(&filter).await?, repo.count(&filter).await?)
    };
    let data = recipe_responses(&mut tx, &state, current_user.as_ref(), recipes).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/recipes/{id}",
    tag = "recipes",
    summary = "Get recipe",
    params(("id" = uuid::Uuid, Path, description = "Recipe ID")),
    responses(
        (status = 200, description = "Recipe", body = RecipeResponse),
        (status = 404, description = "Recipe not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    current_user: Option<CurrentUser>,
) -> Result<Json<RecipeResponse>> {
    require(
        state.policy.as_ref(),
        current_user.as_ref(),
        Resource::Recipes,
        Ownership::NotOwner,
        Action::Read,
    )?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let recipe = Recipes::new(&mut tx).get_by_id(id).await?.ok_or_else(|| recipe_not_found(id))?;
    let response = recipe_response(&mut tx, &state, current_user.as_ref(), recipe).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(response))
}

/// Publish a recipe. Tags and ingredients are written in the same transaction as the recipe.
#[utoipa::path(
    post,
    path = "/recipes",
    request_body = RecipeCreate,
    tag = "recipes",
    summary = "Create recipe",
    responses(
        (status = 201, description = "Recipe created", body = RecipeResponse),
        (status = 400, description = "Invalid submission; nothing was saved"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_recipe(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Recipes, operation::CreateOwn>,
    Json(request): Json<RecipeCreate>,
) -> Result<(StatusCode, Json<RecipeResponse>)> {
    let errors = request.validate();
    if !errors.is_empty() {
        return Err(Error::Validation { errors });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    check_references(&mut tx, &request.tags, &request.ingredients).await?;

    let image = state.media.save_recipe_image(&request.image).await?;
    let db_request = RecipeCreateDBRequest {
        author_id: current_user.id,
        name: request.name,
        image: image.clone(),
        text: request.text,
        cooking_time: request.cooking_time,
        tags: request.tags,
        ingredients: request.ingredients.into_iter().map(Into::into).collect(),
    };

    let persisted = async {
        let created = Recipes::new(&mut tx).create(&db_request).await?;
        let response = recipe_response(&mut tx, &state, Some(&current_user.user), created).await?;
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;
        Ok::<_, Error>(response)
    }
    .await;
    let response = match persisted {
        Ok(response) => response,
        Err(e) => {
            state.media.remove(&image).await;
            return Err(e);
        }
    };

    info!("Recipe {} created by {}", response.id, current_user.username);
    Ok((StatusCode::CREATED, Json(response)))
}

/// Edit a recipe. The tag and ingredient sets are replaced, never merged.
#[utoipa::path(
    patch,
    path = "/recipes/{id}",
    request_body = RecipeUpdate,
    tag = "recipes",
    summary = "Update recipe",
    params(("id" = uuid::Uuid, Path, description = "Recipe ID")),
    responses(
        (status = 200, description = "Recipe updated", body = RecipeResponse),
        (status = 400, description = "Invalid submission; nothing was saved"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_recipe(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    current_user: CurrentUser,
    Json(request): Json<RecipeUpdate>,
) -> Result<Json<RecipeResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    authorize_recipe(&mut tx, &state, &current_user, id, Action::Update).await?;

    let errors = request.validate();
    if !errors.is_empty() {
        return Err(Error::Validation { errors });
    }
    check_references(&mut tx, &request.tags, &request.ingredients).await?;

    let previous_image = Recipes::new(&mut tx).get_summary(id).await?.map(|s| s.image);
    let new_image = match &request.image {
        Some(payload) => Some(state.media.save_recipe_image(payload).await?),
        None => None,
    };

    let db_request = RecipeUpdateDBRequest {
        name: request.name,
        image: new_image.clone(),
        text: request.text,
        cooking_time: request.cooking_time,
        tags: request.tags,
        ingredients: request.ingredients.into_iter().map(Into::into).collect(),
    };

    let persisted = async {
        let updated = Recipes::new(&mut tx).update(id, &db_request).await.map_err(|e| match e {
            DbError::NotFound => recipe_not_found(id),
            other => other.into(),
        })?;
        let response = recipe_response(&mut tx, &state, Some(&current_user), updated).await?;
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;
        Ok::<_, Error>(response)
    }
    .await;
    let response = match persisted {
        Ok(response) => response,
        Err(e) => {
            if let Some(image) = &new_image {
                state.media.remove(image).await;
            }
            return Err(e);
        }
    };

    if let (Some(_), Some(previous)) = (&new_image, previous_image) {
        state.media.remove(&previous).await;
    }

    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/recipes/{id}",
    tag = "recipes",
    summary = "Delete recipe",
    params(("id" = uuid::Uuid, Path, description = "Recipe ID")),
    responses(
        (status = 204, description = "Recipe deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    current_user: CurrentUser,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    authorize_recipe(&mut conn, &state, &current_user, id, Action::Delete).await?;

    let mut repo = Recipes::new(&mut conn);
    let image = repo.get_summary(id).await?.map(|s| s.image);
    if !repo.delete(id).await? {
        return Err(recipe_not_found(id));
    }
    if let Some(image) = image {
        state.media.remove(&image).await;
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Put a recipe into one of the caller's lists. Adding twice is a conflict.
async fn add_to_list(state: &AppState, user: &CurrentUser, id: RecipeId, kind: RecipeListKind) -> Result<RecipeShortResponse> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let summary = Recipes::new(&mut conn)
        .get_summary(id)
        .await?
        .ok_or_else(|| recipe_not_found(id))?;

    match RecipeLists::new(&mut conn, kind).add(user.id, id).await {
        Ok(()) => {}
        Err(DbError::UniqueViolation { .. }) => {
            return Err(Error::Conflict {
                message: format!("Recipe is already in {}", kind.label()),
            })
        }
        // Deleted between the lookup and the insert
        Err(DbError::ForeignKeyViolation { .. }) => return Err(recipe_not_found(id)),
        Err(e) => return Err(e.into()),
    }

    let image_url = state.media.url_for(&summary.image);
    Ok(RecipeShortResponse::from_summary(summary, image_url))
}

/// Take a recipe out of one of the caller's lists. Removing an absent entry is an error.
async fn remove_from_list(state: &AppState, user: &CurrentUser, id: RecipeId, kind: RecipeListKind) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Recipes::new(&mut conn).author_of(id).await?.is_none() {
        return Err(recipe_not_found(id));
    }

    if RecipeLists::new(&mut conn, kind).remove(user.id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::PreconditionFailed {
            message: format!("Recipe is not in {}", kind.label()),
        })
    }
}

#[utoipa::path(
    post,
    path = "/recipes/{id}/favorite",
    tag = "favorites",
    summary = "Add to favorites",
    params(("id" = uuid::Uuid, Path, description = "Recipe ID")),
    responses(
        (status = 201, description = "Added", body = RecipeShortResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Recipe not found"),
        (status = 409, description = "Already in favorites"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn add_favorite(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    current_user: RequiresPermission<resource::Favorites, operation::CreateOwn>,
) -> Result<(StatusCode, Json<RecipeShortResponse>)> {
    let recipe = add_to_list(&state, &current_user, id, RecipeListKind::Favorites).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

#[utoipa::path(
    delete,
    path = "/recipes/{id}/favorite",
    tag = "favorites",
    summary = "Remove from favorites",
    params(("id" = uuid::Uuid, Path, description = "Recipe ID")),
    responses(
        (status = 204, description = "Removed"),
        (status = 400, description = "Not in favorites"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_favorite(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    current_user: RequiresPermission<resource::Favorites, operation::DeleteOwn>,
) -> Result<StatusCode> {
    remove_from_list(&state, &current_user, id, RecipeListKind::Favorites).await
}

#[utoipa::path(
    post,
    path = "/recipes/{id}/shopping_cart",
    tag = "shopping cart",
    summary = "Add to shopping cart",
    params(("id" = uuid::Uuid, Path, description = "Recipe ID")),
    responses(
        (status = 201, description = "Added", body = RecipeShortResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Recipe not found"),
        (status = 409, description = "Already in the shopping cart"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn add_to_shopping_cart(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    current_user: RequiresPermission<resource::ShoppingCart, operation::CreateOwn>,
) -> Result<(StatusCode, Json<RecipeShortResponse>)> {
    let recipe = add_to_list(&state, &current_user, id, RecipeListKind::ShoppingCart).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

#[utoipa::path(
    delete,
    path = "/recipes/{id}/shopping_cart",
    tag = "shopping cart",
    summary = "Remove from shopping cart",
    params(("id" = uuid::Uuid, Path, description = "Recipe ID")),
    responses(
        (status = 204, description = "Removed"),
        (status = 400, description = "Not in the shopping cart"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_from_shopping_cart(
    State(state): State<AppState>,
    Path(id): Path<RecipeId>,
    current_user: RequiresPermission<resource::ShoppingCart, operation::DeleteOwn>,
) -> Result<StatusCode> {
    remove_from_list(&state, &current_user, id, RecipeListKind::ShoppingCart).await
}

/// Download the caller's consolidated shopping list as a text file
#[utoipa::path(
    get,
    path = "/recipes/download_shopping_cart",
    tag = "shopping cart",
    summary = "Download shopping list",
    responses(
        (status = 200, description = "One `name - amountunit` line per ingredient", body = String, content_type = "text/plain"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::ShoppingCart, operation::ReadOwn>,
) -> Result<impl IntoResponse> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let items = ShoppingList::new(&mut conn).aggregate(current_user.id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", shopping_list::FILE_NAME),
            ),
        ],
        shopping_list::render(&items),
    ))
}

#[cfg(test)]
mod tests {
    use crate::api::models::{
        pagination::PaginatedResponse,
        recipes::{RecipeResponse, RecipeShortResponse},
        users::Role,
    };
    use crate::db::handlers::{RecipeLists, Recipes, Repository};
    use crate::test_utils::*;
    use axum::http::{header, StatusCode};
    use serde_json::json;
    use sqlx::PgPool;
    use uuid::Uuid;

    fn submission(tags: &[Uuid], ingredients: &[(Uuid, i32)]) -> serde_json::Value {
        json!({
            "ingredients": ingredients.iter().map(|(id, amount)| json!({ "id": id, "amount": amount })).collect::<Vec<_>>(),
            "tags": tags,
            "image": test_image_data_uri(),
            "name": "Pancakes",
            "text": "Whisk and fry.",
            "cooking_time": 20
        })
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_get_recipe(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let author = create_test_user(&pool, Role::User).await;
        let tag = create_test_tag(&pool, "breakfast").await;
        let flour = create_test_ingredient(&pool, "Flour", "g").await;
        let milk = create_test_ingredient(&pool, "Milk", "ml").await;

        let (name, value) = auth_header(&author);
        let response = server
            .post("/api/recipes")
            .add_header(name, value)
            .json(&submission(&[tag.id], &[(flour.id, 200), (milk.id, 300)]))
            .await;
        response.assert_status(StatusCode::CREATED);

        let recipe: RecipeResponse = response.json();
        assert_eq!(recipe.author.id, author.id);
        assert_eq!(recipe.tags.len(), 1);
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].id, flour.id);
        assert_eq!(recipe.ingredients[0].amount, 200);
        assert!(recipe.image.starts_with("/media/recipes/images/"));
        assert!(!recipe.is_favorited && !recipe.is_in_shopping_cart);

        let fetched: RecipeResponse = server.get(&format!("/api/recipes/{}", recipe.id)).await.json();
        assert_eq!(fetched.name, "Pancakes");
        assert_eq!(fetched.cooking_time, 20);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_requires_authentication(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let tag = create_test_tag(&pool, "breakfast").await;
        let flour = create_test_ingredient(&pool, "Flour", "g").await;

        server
            .post("/api/recipes")
            .json(&submission(&[tag.id], &[(flour.id, 200)]))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_invalid_submission_persists_nothing(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let author = create_test_user(&pool, Role::User).await;
        let tag = create_test_tag(&pool, "breakfast").await;
        let flour = create_test_ingredient(&pool, "Flour", "g").await;

        let cases = [
            submission(&[tag.id], &[(flour.id, 0)]),
            submission(&[tag.id, tag.id], &[(flour.id, 1)]),
            submission(&[tag.id], &[(flour.id, 1), (flour.id, 2)]),
            submission(&[tag.id], &[(Uuid::new_v4(), 1)]),
            submission(&[Uuid::new_v4()], &[(flour.id, 1)]),
            {
                let mut body = submission(&[tag.id], &[(flour.id, 1)]);
                body["cooking_time"] = json!(0);
                body
            },
            {
                let mut body = submission(&[tag.id], &[(flour.id, 1)]);
                body["image"] = json!("data:image/png;base64,bm90IGFuIGltYWdl");
                body
            },
        ];

        for body in cases {
            let (name, value) = auth_header(&author);
            server
                .post("/api/recipes")
                .add_header(name, value)
                .json(&body)
                .await
                .assert_status(StatusCode::BAD_REQUEST);
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes").fetch_one(&pool).await.unwrap();
        assert_eq!(count, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_failed_create_removes_stored_image(pool: PgPool) {
        let media = tempfile::tempdir().unwrap();
        let mut config = create_test_config();
        config.media.root = media.path().to_path_buf();
        let server = crate::Application::new_with_pool(config, pool.clone())
            .await
            .unwrap()
            .into_test_server();

        let tag = create_test_tag(&pool, "breakfast").await;
        let flour = create_test_ingredient(&pool, "Flour", "g").await;

        // The session outlives the account, so the insert fails after the image is saved
        let ghost = create_test_user(&pool, Role::User).await;
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(ghost.id)
            .execute(&pool)
            .await
            .unwrap();

        let (name, value) = auth_header(&ghost);
        server
            .post("/api/recipes")
            .add_header(name, value)
            .json(&submission(&[tag.id], &[(flour.id, 1)]))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let stored = std::fs::read_dir(media.path().join("recipes/images"))
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(stored, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_replaces_ingredients(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let author = create_test_user(&pool, Role::User).await;
        let tag = create_test_tag(&pool, "dinner").await;
        let a = create_test_ingredient(&pool, "Apple", "pcs").await;
        let b = create_test_ingredient(&pool, "Butter", "g").await;
        let recipe = create_test_recipe_with(&pool, author.id, &[tag.id], &[(a.id, 3)]).await;

        let mut body = submission(&[tag.id], &[(b.id, 7)]);
        body.as_object_mut().unwrap().remove("image");

        let (name, value) = auth_header(&author);
        let response = server
            .patch(&format!("/api/recipes/{}", recipe.id))
            .add_header(name, value)
            .json(&body)
            .await;
        response.assert_status_ok();

        let updated: RecipeResponse = response.json();
        assert_eq!(updated.ingredients.len(), 1);
        assert_eq!(updated.ingredients[0].id, b.id);
        assert_eq!(updated.ingredients[0].amount, 7);
        assert_eq!(updated.image, format!("/media/{}", recipe.image));

        let rows: Vec<(Uuid, i32)> = sqlx::query_as("SELECT ingredient_id, amount FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(recipe.id)
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(rows, vec![(b.id, 7)]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_only_author_or_admin_edits(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let author = create_test_user(&pool, Role::User).await;
        let stranger = create_test_user(&pool, Role::User).await;
        let admin = create_test_admin_user(&pool).await;
        let tag = create_test_tag(&pool, "dinner").await;
        let a = create_test_ingredient(&pool, "Apple", "pcs").await;
        let recipe = create_test_recipe_with(&pool, author.id, &[tag.id], &[(a.id, 3)]).await;

        let mut body = submission(&[tag.id], &[(a.id, 4)]);
        body.as_object_mut().unwrap().remove("image");

        let (name, value) = auth_header(&stranger);
        server
            .patch(&format!("/api/recipes/{}", recipe.id))
            .add_header(name, value)
            .json(&body)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = auth_header(&stranger);
        server
            .delete(&format!("/api/recipes/{}", recipe.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = auth_header(&admin);
        server
            .patch(&format!("/api/recipes/{}", recipe.id))
            .add_header(name, value)
            .json(&body)
            .await
            .assert_status_ok();

        let (name, value) = auth_header(&author);
        server
            .delete(&format!("/api/recipes/{}", recipe.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let (name, value) = auth_header(&author);
        server
            .delete(&format!("/api/recipes/{}", recipe.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_favorite_toggle_state_machine(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::User).await;
        let recipe = create_test_recipe(&pool, user.id).await;
        let path = format!("/api/recipes/{}/favorite", recipe.id);

        let (name, value) = auth_header(&user);
        let first = server.post(&path).add_header(name, value).await;
        first.assert_status(StatusCode::CREATED);
        let short: RecipeShortResponse = first.json();
        assert_eq!(short.id, recipe.id);
        assert_eq!(short.cooking_time, recipe.cooking_time);

        let (name, value) = auth_header(&user);
        server.post(&path).add_header(name, value).await.assert_status(StatusCode::CONFLICT);

        {
            let mut conn = pool.acquire().await.unwrap();
            assert_eq!(RecipeLists::favorites(&mut conn).count(user.id).await.unwrap(), 1);
        }

        let (name, value) = auth_header(&user);
        server.delete(&path).add_header(name, value).await.assert_status(StatusCode::NO_CONTENT);

        let (name, value) = auth_header(&user);
        server.delete(&path).add_header(name, value).await.assert_status(StatusCode::BAD_REQUEST);

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(RecipeLists::favorites(&mut conn).count(user.id).await.unwrap(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_toggles_reject_missing_recipe_and_anonymous(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::User).await;
        let missing = Uuid::new_v4();

        for list in ["favorite", "shopping_cart"] {
            let path = format!("/api/recipes/{missing}/{list}");
            let (name, value) = auth_header(&user);
            server.post(&path).add_header(name, value).await.assert_status(StatusCode::NOT_FOUND);
            let (name, value) = auth_header(&user);
            server.delete(&path).add_header(name, value).await.assert_status(StatusCode::NOT_FOUND);
            server.post(&path).await.assert_status(StatusCode::UNAUTHORIZED);
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_and_flags(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let alice = create_test_user(&pool, Role::User).await;
        let bob = create_test_user(&pool, Role::User).await;
        let breakfast = create_test_tag(&pool, "breakfast").await;
        let dinner = create_test_tag(&pool, "dinner").await;
        let egg = create_test_ingredient(&pool, "Egg", "pcs").await;

        let omelette = create_test_recipe_with(&pool, alice.id, &[breakfast.id], &[(egg.id, 3)]).await;
        let stew = create_test_recipe_with(&pool, bob.id, &[dinner.id], &[(egg.id, 1)]).await;
        {
            let mut conn = pool.acquire().await.unwrap();
            RecipeLists::favorites(&mut conn).add(alice.id, stew.id).await.unwrap();
            RecipeLists::shopping_cart(&mut conn).add(alice.id, omelette.id).await.unwrap();
        }

        let all: PaginatedResponse<RecipeResponse> = server.get("/api/recipes").await.json();
        assert_eq!(all.total_count, 2);
        // Newest first
        assert_eq!(all.data[0].id, stew.id);

        let by_tag: PaginatedResponse<RecipeResponse> = server.get("/api/recipes?tags=breakfast").await.json();
        assert_eq!(by_tag.data.iter().map(|r| r.id).collect::<Vec<_>>(), vec![omelette.id]);

        let both_tags: PaginatedResponse<RecipeResponse> = server.get("/api/recipes?tags=breakfast&tags=dinner").await.json();
        assert_eq!(both_tags.total_count, 2);

        let by_author: PaginatedResponse<RecipeResponse> = server
            .get("/api/recipes")
            .add_query_param("author", bob.id)
            .await
            .json();
        assert_eq!(by_author.data.iter().map(|r| r.id).collect::<Vec<_>>(), vec![stew.id]);

        let (name, value) = auth_header(&alice);
        let favorites: PaginatedResponse<RecipeResponse> = server
            .get("/api/recipes?is_favorited=1")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(favorites.total_count, 1);
        assert!(favorites.data[0].is_favorited);
        assert!(!favorites.data[0].is_in_shopping_cart);

        let (name, value) = auth_header(&alice);
        let cart: PaginatedResponse<RecipeResponse> = server
            .get("/api/recipes?is_in_shopping_cart=1")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(cart.data.iter().map(|r| r.id).collect::<Vec<_>>(), vec![omelette.id]);
        assert!(cart.data[0].is_in_shopping_cart);

        // Anonymous callers cannot filter by their own lists
        let anonymous: PaginatedResponse<RecipeResponse> = server.get("/api/recipes?is_favorited=1").await.json();
        assert_eq!(anonymous.total_count, 2);

        let page: PaginatedResponse<RecipeResponse> = server.get("/api/recipes?limit=1&skip=1").await.json();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id, omelette.id);
        assert_eq!(page.total_count, 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_download_shopping_cart(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::User).await;
        let tag = create_test_tag(&pool, "dinner").await;
        let flour = create_test_ingredient(&pool, "Flour", "g").await;
        let egg = create_test_ingredient(&pool, "Egg", "pcs").await;
        let milk = create_test_ingredient(&pool, "Milk", "ml").await;
        let x = create_test_recipe_with(&pool, user.id, &[tag.id], &[(flour.id, 200), (egg.id, 2)]).await;
        let y = create_test_recipe_with(&pool, user.id, &[tag.id], &[(flour.id, 100), (milk.id, 50)]).await;

        server
            .get("/api/recipes/download_shopping_cart")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let (name, value) = auth_header(&user);
        let empty = server.get("/api/recipes/download_shopping_cart").add_header(name, value).await;
        empty.assert_status_ok();
        assert_eq!(empty.text(), "");

        for recipe in [&x, &y] {
            let (name, value) = auth_header(&user);
            server
                .post(&format!("/api/recipes/{}/shopping_cart", recipe.id))
                .add_header(name, value)
                .await
                .assert_status(StatusCode::CREATED);
        }

        let (name, value) = auth_header(&user);
        let response = server.get("/api/recipes/download_shopping_cart").add_header(name, value).await;
        response.assert_status_ok();
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"shopping_cart.txt\""
        );
        assert!(response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        assert_eq!(response.text(), "Egg - 2pcs\nFlour - 300g\nMilk - 50ml");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_deleting_recipe_clears_lists(pool: PgPool) {
        let user = create_test_user(&pool, Role::User).await;
        let recipe = create_test_recipe(&pool, user.id).await;

        let mut conn = pool.acquire().await.unwrap();
        RecipeLists::favorites(&mut conn).add(user.id, recipe.id).await.unwrap();
        RecipeLists::shopping_cart(&mut conn).add(user.id, recipe.id).await.unwrap();

        assert!(Recipes::new(&mut conn).delete(recipe.id).await.unwrap());
        assert_eq!(RecipeLists::favorites(&mut conn).count(user.id).await.unwrap(), 0);
        assert_eq!(RecipeLists::shopping_cart(&mut conn).count(user.id).await.unwrap(), 0);
    }
}
