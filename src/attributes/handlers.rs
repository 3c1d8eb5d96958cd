use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{AttributeResponse, CreateAttributeRequest, ListAttributesQuery},
    repo_types::AttributeKind,
    services,
};
use crate::{
    auth::AuthUser,
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    state::AppState,
};

/// Routes for one attribute kind, mounted at `/tags` or `/ingredients`.
pub fn routes(kind: AttributeKind) -> Router<AppState> {
    let base = match kind {
        AttributeKind::Tag => "/tags",
        AttributeKind::Ingredient => "/ingredients",
    };
    Router::new()
        .route(base, get(list_attributes).post(create_attribute))
        .route(&format!("{base}/:id"), delete(delete_attribute))
        .layer(Extension(kind))
}

#[instrument(skip(state))]
pub async fn list_attributes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Extension(kind): Extension<AttributeKind>,
    AppQuery(q): AppQuery<ListAttributesQuery>,
) -> AppResult<Json<Vec<AttributeResponse>>> {
    let rows = services::list(&state, kind, user_id, q.assigned_only != 0).await?;
    Ok(Json(rows.into_iter().map(AttributeResponse::from).collect()))
}

#[instrument(skip(state, body))]
pub async fn create_attribute(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Extension(kind): Extension<AttributeKind>,
    AppJson(body): AppJson<CreateAttributeRequest>,
) -> AppResult<(StatusCode, Json<AttributeResponse>)> {
    let row = services::create(&state, kind, user_id, &body.name).await?;
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[instrument(skip(state))]
pub async fn delete_attribute(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Extension(kind): Extension<AttributeKind>,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    services::delete(&state, kind, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
