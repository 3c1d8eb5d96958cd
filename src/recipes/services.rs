use std::collections::HashMap;

use anyhow::Context;
use bytes::Bytes;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::RecipeInput;
use super::repo_types::{NewRecipe, Recipe, RecipeChanges, RecipeFilter, RecipeRecord};
use crate::attributes::{repo_types::Attribute, services::resolve_owned, AttributeKind};
use crate::error::{AppError, AppResult};
use crate::images::services::{inspect_image, recipe_image_key};
use crate::state::AppState;

pub const MAX_TITLE_LEN: usize = 255;

fn not_found() -> AppError {
    AppError::not_found("Recipe not found")
}

fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::validation("Title cannot be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::validation(format!(
            "Title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

fn validate_time(minutes: i32) -> AppResult<i32> {
    if minutes < 0 {
        return Err(AppError::validation("time_minutes cannot be negative"));
    }
    Ok(minutes)
}

/// Up to five digits, two of them decimals; stored with exactly two.
fn validate_price(price: Decimal) -> AppResult<Decimal> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(AppError::validation("price cannot be negative"));
    }
    if price.normalize().scale() > 2 {
        return Err(AppError::validation(
            "Ensure that there are no more than 2 decimal places in price",
        ));
    }
    if price >= Decimal::from(1000) {
        return Err(AppError::validation(
            "Ensure that there are no more than 5 digits in total in price",
        ));
    }
    let mut price = price.abs();
    price.rescale(2);
    Ok(price)
}

fn required<T>(value: Option<T>, field: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::validation(format!("{field} is required")))
}

/// Parses a comma-separated id list; blank entries are ignored.
pub fn parse_ids(raw: Option<&str>, field: &str) -> AppResult<Vec<Uuid>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s)
                .map_err(|_| AppError::validation(format!("Invalid id \"{s}\" in {field}")))
        })
        .collect()
}

fn owned(recipe: Option<Recipe>, owner: Uuid) -> AppResult<Recipe> {
    match recipe {
        Some(r) if r.user_id == owner => Ok(r),
        _ => Err(not_found()),
    }
}

async fn find_owned(st: &AppState, owner: Uuid, id: Uuid) -> AppResult<Recipe> {
    owned(st.recipes.find(id).await?, owner)
}

fn group_links(
    links: Vec<(Uuid, Uuid)>,
    attrs: &HashMap<Uuid, Attribute>,
) -> HashMap<Uuid, Vec<Attribute>> {
    let mut out: HashMap<Uuid, Vec<Attribute>> = HashMap::new();
    for (recipe_id, attr_id) in links {
        if let Some(a) = attrs.get(&attr_id) {
            out.entry(recipe_id).or_default().push(a.clone());
        }
    }
    for list in out.values_mut() {
        list.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    }
    out
}

async fn load_kind(
    st: &AppState,
    kind: AttributeKind,
    recipe_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<Attribute>>> {
    let links = st.recipes.links(kind, recipe_ids).await?;
    let mut attr_ids: Vec<Uuid> = links.iter().map(|(_, a)| *a).collect();
    attr_ids.sort();
    attr_ids.dedup();
    let attrs: HashMap<Uuid, Attribute> = st
        .attributes
        .find_many(kind, &attr_ids)
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();
    Ok(group_links(links, &attrs))
}

async fn load_records(st: &AppState, recipes: Vec<Recipe>) -> AppResult<Vec<RecipeRecord>> {
    let ids: Vec<Uuid> = recipes.iter().map(|r| r.id).collect();
    let mut tags = load_kind(st, AttributeKind::Tag, &ids).await?;
    let mut ingredients = load_kind(st, AttributeKind::Ingredient, &ids).await?;
    Ok(recipes
        .into_iter()
        .map(|recipe| RecipeRecord {
            tags: tags.remove(&recipe.id).unwrap_or_default(),
            ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
            recipe,
        })
        .collect())
}

async fn load_record(st: &AppState, recipe: Recipe) -> AppResult<RecipeRecord> {
    load_records(st, vec![recipe])
        .await?
        .pop()
        .ok_or_else(not_found)
}

pub async fn list(st: &AppState, owner: Uuid, filter: RecipeFilter) -> AppResult<Vec<RecipeRecord>> {
    let mut rows = st.recipes.list(owner, &filter).await?;
    rows.retain(|r| r.user_id == owner);
    load_records(st, rows).await
}

pub async fn get(st: &AppState, owner: Uuid, id: Uuid) -> AppResult<RecipeRecord> {
    let recipe = find_owned(st, owner, id).await?;
    load_record(st, recipe).await
}

pub async fn create(st: &AppState, owner: Uuid, input: RecipeInput) -> AppResult<RecipeRecord> {
    let new = NewRecipe {
        title: validate_title(&required(input.title, "title")?)?,
        time_minutes: validate_time(required(input.time_minutes, "time_minutes")?)?,
        price: validate_price(required(input.price, "price")?)?,
    };
    let tags = resolve_owned(st, AttributeKind::Tag, owner, &input.tags.unwrap_or_default()).await?;
    let ingredients = resolve_owned(
        st,
        AttributeKind::Ingredient,
        owner,
        &input.ingredients.unwrap_or_default(),
    )
    .await?;

    let recipe = st.recipes.insert(owner, new, &tags, &ingredients).await?;
    info!(recipe_id = %recipe.id, %owner, "recipe created");
    load_record(st, recipe).await
}

/// Partial updates change only supplied fields; full updates require every
/// scalar and reset omitted associations. A supplied association list always
/// replaces the existing set.
pub async fn update(
    st: &AppState,
    owner: Uuid,
    id: Uuid,
    input: RecipeInput,
    partial: bool,
) -> AppResult<RecipeRecord> {
    find_owned(st, owner, id).await?;

    let (title, time_minutes, price) = if partial {
        (input.title, input.time_minutes, input.price)
    } else {
        (
            Some(required(input.title, "title")?),
            Some(required(input.time_minutes, "time_minutes")?),
            Some(required(input.price, "price")?),
        )
    };
    let (tags, ingredients) = if partial {
        (input.tags, input.ingredients)
    } else {
        (
            Some(input.tags.unwrap_or_default()),
            Some(input.ingredients.unwrap_or_default()),
        )
    };

    let changes = RecipeChanges {
        title: title.as_deref().map(validate_title).transpose()?,
        time_minutes: time_minutes.map(validate_time).transpose()?,
        price: price.map(validate_price).transpose()?,
        tags: match tags {
            Some(ids) => Some(resolve_owned(st, AttributeKind::Tag, owner, &ids).await?),
            None => None,
        },
        ingredients: match ingredients {
            Some(ids) => Some(resolve_owned(st, AttributeKind::Ingredient, owner, &ids).await?),
            None => None,
        },
    };

    let recipe = st.recipes.update(id, changes).await?.ok_or_else(not_found)?;
    info!(recipe_id = %recipe.id, %owner, partial, "recipe updated");
    load_record(st, recipe).await
}

/// Presigned URL for the recipe image, if it has one.
pub async fn image_url(st: &AppState, recipe: &Recipe) -> AppResult<Option<String>> {
    match recipe.image.as_deref() {
        Some(key) => {
            let url = st
                .storage
                .presign_get(key, st.config.image_url_ttl_secs)
                .await
                .with_context(|| format!("presign url for {key}"))?;
            Ok(Some(url))
        }
        None => Ok(None),
    }
}

async fn discard_blob(st: &AppState, key: &str) {
    if let Err(e) = st.storage.delete_object(key).await {
        warn!(error = %e, key, "failed to delete image blob");
    }
}

/// Validates, stores and attaches a new image. The previous blob is removed
/// best-effort once the new key is persisted.
pub async fn upload_image(
    st: &AppState,
    owner: Uuid,
    id: Uuid,
    filename: Option<&str>,
    data: Bytes,
) -> AppResult<Recipe> {
    let recipe = find_owned(st, owner, id).await?;

    if data.len() > st.config.max_upload_bytes {
        return Err(AppError::validation(format!(
            "File too large. Maximum size is {} bytes",
            st.config.max_upload_bytes
        )));
    }
    let detected = inspect_image(&data)?;
    let key = recipe_image_key(Uuid::new_v4(), filename, detected.extension);

    st.storage
        .put_object(&key, data, detected.content_type)
        .await
        .with_context(|| format!("put_object {key}"))?;

    let updated = match st.recipes.set_image(id, Some(&key)).await {
        Ok(Some(r)) => r,
        Ok(None) => {
            discard_blob(st, &key).await;
            return Err(not_found());
        }
        Err(e) => {
            discard_blob(st, &key).await;
            return Err(e.into());
        }
    };

    if let Some(old) = recipe.image.as_deref().filter(|old| *old != key) {
        discard_blob(st, old).await;
    }
    info!(recipe_id = %id, %owner, key = %key, "recipe image uploaded");
    Ok(updated)
}

pub async fn delete(st: &AppState, owner: Uuid, id: Uuid) -> AppResult<()> {
    let recipe = find_owned(st, owner, id).await?;
    if !st.recipes.delete(id).await? {
        return Err(not_found());
    }
    if let Some(key) = recipe.image.as_deref() {
        discard_blob(st, key).await;
    }
    info!(recipe_id = %id, %owner, "recipe deleted");
    Ok(())
}
