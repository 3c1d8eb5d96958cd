use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::RecipeRecord;
use crate::attributes::repo_types::Attribute;

/// Body of create, full update and partial update. Which fields are
/// mandatory depends on the operation.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub time_minutes: Option<i32>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub tags: Option<Vec<Uuid>>,
    #[serde(default)]
    pub ingredients: Option<Vec<Uuid>>,
}

/// Raw list query; `tags` and `ingredients` are comma-separated ids.
#[derive(Debug, Default, Deserialize)]
pub struct ListRecipesQuery {
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub ingredients: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedAttribute {
    pub id: Uuid,
    pub name: String,
}

impl From<&Attribute> for NestedAttribute {
    fn from(a: &Attribute) -> Self {
        Self {
            id: a.id,
            name: a.name.clone(),
        }
    }
}

/// List projection: associations as ids only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeSummary {
    pub id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<Uuid>,
}

impl From<&RecipeRecord> for RecipeSummary {
    fn from(r: &RecipeRecord) -> Self {
        Self {
            id: r.recipe.id,
            title: r.recipe.title.clone(),
            time_minutes: r.recipe.time_minutes,
            price: r.recipe.price,
            tags: r.tags.iter().map(|t| t.id).collect(),
            ingredients: r.ingredients.iter().map(|i| i.id).collect(),
        }
    }
}

/// Detail projection: nested associations and a resolvable image URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDetail {
    pub id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub image: Option<String>,
    pub tags: Vec<NestedAttribute>,
    pub ingredients: Vec<NestedAttribute>,
}

impl RecipeDetail {
    pub fn new(r: &RecipeRecord, image_url: Option<String>) -> Self {
        Self {
            id: r.recipe.id,
            title: r.recipe.title.clone(),
            time_minutes: r.recipe.time_minutes,
            price: r.recipe.price,
            image: image_url,
            tags: r.tags.iter().map(NestedAttribute::from).collect(),
            ingredients: r.ingredients.iter().map(NestedAttribute::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeImage {
    pub id: Uuid,
    pub image: Option<String>,
}
