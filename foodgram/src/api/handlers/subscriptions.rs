use crate::{
    api::{
        handlers::users::user_responses,
        models::{
            pagination::PaginatedResponse,
            recipes::RecipeShortResponse,
            subscriptions::{recipes_limit, ListSubscriptionsQuery, SubscribeQuery, SubscriptionResponse},
            users::CurrentUser,
        },
    },
    auth::permissions::{operation, resource, RequiresPermission},
    db::{
        errors::DbError,
        handlers::{Recipes, Repository, Subscriptions, Users},
        models::users::UserDBResponse,
    },
    errors::{Error, Result},
    media::MediaStorage,
    types::UserId,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::PgConnection;
use tracing::info;

/// Attach recipe previews and counts to followed authors, keeping their order
async fn subscription_responses(
    conn: &mut PgConnection,
    media: &MediaStorage,
    caller: &CurrentUser,
    authors: Vec<UserDBResponse>,
    limit: i64,
) -> Result<Vec<SubscriptionResponse>> {
    let ids: Vec<UserId> = authors.iter().map(|a| a.id).collect();
    let (mut recent, counts) = {
        let mut repo = Recipes::new(conn);
        (repo.recent_by_authors(&ids, limit).await?, repo.count_by_authors(&ids).await?)
    };

    Ok(user_responses(conn, Some(caller), authors)
        .await?
        .into_iter()
        .map(|author| {
            let recipes = recent
                .remove(&author.id)
                .unwrap_or_default()
                .into_iter()
                .map(|summary| {
                    let url = media.url_for(&summary.image);
                    RecipeShortResponse::from_summary(summary, url)
                })
                .collect();
            let count = counts.get(&author.id).copied().unwrap_or(0);
            SubscriptionResponse::new(author, recipes, count)
        })
        .collect())
}

/// Authors the caller follows, ordered by username
#[utoipa::path(
    get,
    path = "/users/subscriptions",
    tag = "subscriptions",
    summary = "List subscriptions",
    params(ListSubscriptionsQuery),
    responses(
        (status = 200, description = "Followed authors with recipe previews", body = PaginatedResponse<SubscriptionResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    Query(query): Query<ListSubscriptionsQuery>,
    current_user: RequiresPermission<resource::Subscriptions, operation::ReadOwn>,
) -> Result<Json<PaginatedResponse<SubscriptionResponse>>> {
    let (skip, limit) = query.pagination.params(&state.config.pagination);
    let preview = recipes_limit(query.recipes_limit, state.config.subscriptions.default_recipes_limit);

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let (author_ids, total_count) = {
        let mut repo = Subscriptions::new(&mut tx);
        (
            repo.list_authors(current_user.id, skip, limit).await?,
            repo.count(current_user.id).await?,
        )
    };

    let mut by_id = Users::new(&mut tx).get_bulk(author_ids.clone()).await?;
    let authors: Vec<UserDBResponse> = author_ids.iter().filter_map(|id| by_id.remove(id)).collect();
    let data = subscription_responses(&mut tx, &state.media, &current_user, authors, preview).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// Follow an author
#[utoipa::path(
    post,
    path = "/users/{id}/subscribe",
    tag = "subscriptions",
    summary = "Subscribe",
    params(
        ("id" = uuid::Uuid, Path, description = "Author ID"),
        SubscribeQuery,
    ),
    responses(
        (status = 201, description = "Subscribed", body = SubscriptionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Author not found"),
        (status = 409, description = "Already subscribed, or subscribing to yourself"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn subscribe(
    State(state): State<AppState>,
    Path(author_id): Path<UserId>,
    Query(query): Query<SubscribeQuery>,
    current_user: RequiresPermission<resource::Subscriptions, operation::CreateOwn>,
) -> Result<(StatusCode, Json<SubscriptionResponse>)> {
    if author_id == current_user.id {
        return Err(Error::Conflict {
            message: "You cannot subscribe to yourself".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let author = Users::new(&mut tx).get_by_id(author_id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: author_id.to_string(),
    })?;

    match Subscriptions::new(&mut tx).subscribe(current_user.id, author_id).await {
        Ok(()) => {}
        Err(DbError::UniqueViolation { .. }) => {
            return Err(Error::Conflict {
                message: format!("Already subscribed to {}", author.username),
            })
        }
        Err(e) => return Err(e.into()),
    }

    let preview = recipes_limit(query.recipes_limit, state.config.subscriptions.default_recipes_limit);
    let response = subscription_responses(&mut tx, &state.media, &current_user, vec![author], preview)
        .await?
        .pop()
        .ok_or_else(|| Error::Internal {
            operation: format!("load subscription to {author_id}"),
        })?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!("{} subscribed to {}", current_user.username, response.username);
    Ok((StatusCode::CREATED, Json(response)))
}

/// Stop following an author
#[utoipa::path(
    delete,
    path = "/users/{id}/subscribe",
    tag = "subscriptions",
    summary = "Unsubscribe",
    params(("id" = uuid::Uuid, Path, description = "Author ID")),
    responses(
        (status = 204, description = "Unsubscribed"),
        (status = 400, description = "Not subscribed"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Author not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn unsubscribe(
    State(state): State<AppState>,
    Path(author_id): Path<UserId>,
    current_user: RequiresPermission<resource::Subscriptions, operation::DeleteOwn>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Users::new(&mut conn).get_by_id(author_id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: author_id.to_string(),
        });
    }

    if Subscriptions::new(&mut conn).unsubscribe(current_user.id, author_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::PreconditionFailed {
            message: "You are not subscribed to this user".to_string(),
        })
    }
}
