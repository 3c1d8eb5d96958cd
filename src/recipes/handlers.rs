use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{ListRecipesQuery, RecipeDetail, RecipeImage, RecipeInput, RecipeSummary},
    repo_types::{RecipeFilter, RecipeRecord},
    services,
};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    extract::{AppJson, AppPath, AppQuery},
    state::AppState,
};

const IMAGE_FIELD: &str = "image";

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Request body cap for the upload route, derived from the per-file limit so
/// that `MAX_UPLOAD_BYTES` is the only knob.
pub fn upload_body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes.saturating_add(MULTIPART_OVERHEAD)
}

pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/:id",
            get(get_recipe)
                .put(replace_recipe)
                .patch(patch_recipe)
                .delete(delete_recipe),
        )
        .route(
            "/recipes/:id/upload-image",
            post(upload_image).layer(DefaultBodyLimit::max(upload_body_limit(max_upload_bytes))),
        )
}

async fn detail(state: &AppState, record: &RecipeRecord) -> AppResult<RecipeDetail> {
    let url = services::image_url(state, &record.recipe).await?;
    Ok(RecipeDetail::new(record, url))
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppQuery(q): AppQuery<ListRecipesQuery>,
) -> AppResult<Json<Vec<RecipeSummary>>> {
    let filter = RecipeFilter {
        tags: services::parse_ids(q.tags.as_deref(), "tags")?,
        ingredients: services::parse_ids(q.ingredients.as_deref(), "ingredients")?,
    };
    let records = services::list(&state, user_id, filter).await?;
    Ok(Json(records.iter().map(RecipeSummary::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<RecipeDetail>> {
    let record = services::get(&state, user_id, id).await?;
    Ok(Json(detail(&state, &record).await?))
}

#[instrument(skip(state, body))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(body): AppJson<RecipeInput>,
) -> AppResult<(StatusCode, HeaderMap, Json<RecipeDetail>)> {
    let record = services::create(&state, user_id, body).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/recipes/{}", record.recipe.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(detail(&state, &record).await?)))
}

#[instrument(skip(state, body))]
pub async fn replace_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<RecipeInput>,
) -> AppResult<Json<RecipeDetail>> {
    let record = services::update(&state, user_id, id, body, false).await?;
    Ok(Json(detail(&state, &record).await?))
}

#[instrument(skip(state, body))]
pub async fn patch_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<RecipeInput>,
) -> AppResult<Json<RecipeDetail>> {
    let record = services::update(&state, user_id, id, body, true).await?;
    Ok(Json(detail(&state, &record).await?))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    services::delete(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /recipes/:id/upload-image (multipart, field `image`)
#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    mut mp: Multipart,
) -> AppResult<Json<RecipeImage>> {
    let mut upload: Option<(Option<String>, Bytes)> = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::validation(format!("Failed to read upload: {e}")))?;
        upload = Some((filename, data));
        break;
    }
    let Some((filename, data)) = upload else {
        return Err(AppError::validation("image is required"));
    };

    let recipe = services::upload_image(&state, user_id, id, filename.as_deref(), data).await?;
    Ok(Json(RecipeImage {
        id: recipe.id,
        image: services::image_url(&state, &recipe).await?,
    }))
}
