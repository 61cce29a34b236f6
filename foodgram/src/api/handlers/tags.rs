use crate::{
    api::models::tags::{TagCreate, TagResponse, TagUpdate},
    auth::permissions::{operation, resource, RequiresPermission},
    db::{
        errors::DbError,
        handlers::{tags::TagFilter, Repository, Tags},
        models::tags::{TagCreateDBRequest, TagUpdateDBRequest},
    },
    errors::{Error, Result},
    types::TagId,
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

fn tag_not_found(id: TagId) -> Error {
    Error::NotFound {
        resource: "Tag".to_string(),
        id: id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/tags",
    tag = "tags",
    summary = "List tags",
    responses(
        (status = 200, description = "All tags ordered by name", body = Vec<TagResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tags = Tags::new(&mut conn).list(&TagFilter).await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/tags/{id}",
    tag = "tags",
    summary = "Get tag",
    params(("id" = uuid::Uuid, Path, description = "Tag ID")),
    responses(
        (status = 200, description = "Tag", body = TagResponse),
        (status = 404, description = "Tag not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_tag(State(state): State<AppState>, Path(id): Path<TagId>) -> Result<Json<TagResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tag = Tags::new(&mut conn).get_by_id(id).await?.ok_or_else(|| tag_not_found(id))?;
    Ok(Json(TagResponse::from(tag)))
}

#[utoipa::path(
    post,
    path = "/tags",
    request_body = TagCreate,
    tag = "tags",
    summary = "Create tag",
    responses(
        (status = 201, description = "Tag created", body = TagResponse),
        (status = 400, description = "Invalid tag"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Name, color or slug already used"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_tag(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Tags, operation::CreateAll>,
    Json(request): Json<TagCreate>,
) -> Result<(StatusCode, Json<TagResponse>)> {
    let errors = request.validate();
    if !errors.is_empty() {
        return Err(Error::Validation { errors });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tag = Tags::new(&mut conn).create(&TagCreateDBRequest::from(request)).await?;
    Ok((StatusCode::CREATED, Json(TagResponse::from(tag))))
}

#[utoipa::path(
    patch,
    path = "/tags/{id}",
    request_body = TagUpdate,
    tag = "tags",
    summary = "Update tag",
    params(("id" = uuid::Uuid, Path, description = "Tag ID")),
    responses(
        (status = 200, description = "Tag updated", body = TagResponse),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Tag not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_tag(
    State(state): State<AppState>,
    Path(id): Path<TagId>,
    _: RequiresPermission<resource::Tags, operation::UpdateAll>,
    Json(request): Json<TagUpdate>,
) -> Result<Json<TagResponse>> {
    let errors = request.validate();
    if !errors.is_empty() {
        return Err(Error::Validation { errors });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tag = match Tags::new(&mut conn).update(id, &TagUpdateDBRequest::from(request)).await {
        Ok(tag) => tag,
        Err(DbError::NotFound) => return Err(tag_not_found(id)),
        Err(e) => return Err(e.into()),
    };
    Ok(Json(TagResponse::from(tag)))
}

#[utoipa::path(
    delete,
    path = "/tags/{id}",
    tag = "tags",
    summary = "Delete tag",
    params(("id" = uuid::Uuid, Path, description = "Tag ID")),
    responses(
        (status = 204, description = "Tag deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Tag not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_tag(
    State(state): State<AppState>,
    Path(id): Path<TagId>,
    _: RequiresPermission<resource::Tags, operation::DeleteAll>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Tags::new(&mut conn).delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(tag_not_found(id))
    }
}
