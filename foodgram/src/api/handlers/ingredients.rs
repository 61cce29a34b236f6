use crate::{
    api::models::ingredients::{IngredientCreate, IngredientResponse, ListIngredientsQuery},
    auth::permissions::{operation, resource, RequiresPermission},
    db::{
        handlers::{ingredients::IngredientFilter, Ingredients, Repository},
        models::ingredients::IngredientCreateDBRequest,
    },
    errors::{Error, Result},
    types::IngredientId,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

fn ingredient_not_found(id: IngredientId) -> Error {
    Error::NotFound {
        resource: "Ingredient".to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/ingredients",
    tag = "ingredients",
    summary = "Search ingredients",
    params(ListIngredientsQuery),
    responses(
        (status = 200, description = "Matching ingredients ordered by name", body = Vec<IngredientResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(query): Query<ListIngredientsQuery>,
) -> Result<Json<Vec<IngredientResponse>>> {
    let filter = IngredientFilter {
        name_prefix: query.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let ingredients = Ingredients::new(&mut conn).list(&filter).await?;
    Ok(Json(ingredients.into_iter().map(IngredientResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/ingredients/{id}",
    tag = "ingredients",
    summary = "Get ingredient",
    params(("id" = uuid::Uuid, Path, description = "Ingredient ID")),
    responses(
        (status = 200, description = "Ingredient", body = IngredientResponse),
        (status = 404, description = "Ingredient not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<IngredientId>,
) -> Result<Json<IngredientResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let ingredient = Ingredients::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| ingredient_not_found(id))?;
    Ok(Json(IngredientResponse::from(ingredient)))
}

#[utoipa::path(
    post,
    path = "/ingredients",
    request_body = IngredientCreate,
    tag = "ingredients",
    summary = "Create ingredient",
    responses(
        (status = 201, description = "Ingredient created", body = IngredientResponse),
        (status = 400, description = "Invalid ingredient"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Ingredient with this unit already exists"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_ingredient(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Ingredients, operation::CreateAll>,
    Json(request): Json<IngredientCreate>,
) -> Result<(StatusCode, Json<IngredientResponse>)> {
    let errors = request.validate();
    if !errors.is_empty() {
        return Err(Error::Validation { errors });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let ingredient = Ingredients::new(&mut conn)
        .create(&IngredientCreateDBRequest::from(request))
        .await?;
    Ok((StatusCode::CREATED, Json(IngredientResponse::from(ingredient))))
}

/// Delete an ingredient. Ingredients used by a recipe cannot be deleted.
#[utoipa::path(
    delete,
    path = "/ingredients/{id}",
    tag = "ingredients",
    summary = "Delete ingredient",
    params(("id" = uuid::Uuid, Path, description = "Ingredient ID")),
    responses(
        (status = 204, description = "Ingredient deleted"),
        (status = 400, description = "Ingredient is used by a recipe"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Ingredient not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_ingredient(
    State(state): State<AppState>,
    Path(id): Path<IngredientId>,
    _: RequiresPermission<resource::Ingredients, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Ingredients::new(&mut conn).delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ingredient_not_found(id))
    }
}
