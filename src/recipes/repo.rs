use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::repo_types::{NewRecipe, Recipe, RecipeChanges, RecipeFilter};
use crate::attributes::repo_types::AttributeKind;

const RECIPE_COLUMNS: &str = "id, user_id, title, time_minutes, price, image, created_at";

#[async_trait]
pub trait RecipeRepo: Send + Sync {
    /// Rows owned by `owner` matching `filter`, ordered by title descending.
    async fn list(&self, owner: Uuid, filter: &RecipeFilter) -> anyhow::Result<Vec<Recipe>>;
    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Recipe>>;
    async fn insert(
        &self,
        owner: Uuid,
        new: NewRecipe,
        tags: &[Uuid],
        ingredients: &[Uuid],
    ) -> anyhow::Result<Recipe>;
    /// Applies scalars and replaces supplied association sets atomically.
    async fn update(&self, id: Uuid, changes: RecipeChanges) -> anyhow::Result<Option<Recipe>>;
    async fn set_image(&self, id: Uuid, image: Option<&str>) -> anyhow::Result<Option<Recipe>>;
    /// Removes the row and its association rows.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
    /// `(recipe_id, attribute_id)` pairs for the given recipes.
    async fn links(
        &self,
        kind: AttributeKind,
        recipe_ids: &[Uuid],
    ) -> anyhow::Result<Vec<(Uuid, Uuid)>>;
}

pub struct PgRecipeRepo {
    db: PgPool,
}

impl PgRecipeRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

async fn replace_links_tx(
    tx: &mut Transaction<'_, Postgres>,
    kind: AttributeKind,
    recipe_id: Uuid,
    ids: &[Uuid],
) -> anyhow::Result<()> {
    let (join_table, join_col) = kind.join();
    sqlx::query(&format!("DELETE FROM {join_table} WHERE recipe_id = $1"))
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("clear {join_table}"))?;
    if !ids.is_empty() {
        sqlx::query(&format!(
            r#"
            INSERT INTO {join_table} (recipe_id, {join_col})
            SELECT $1, UNNEST($2::uuid[])
            "#
        ))
        .bind(recipe_id)
        .bind(ids)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("fill {join_table}"))?;
    }
    Ok(())
}

#[async_trait]
impl RecipeRepo for PgRecipeRepo {
    async fn list(&self, owner: Uuid, filter: &RecipeFilter) -> anyhow::Result<Vec<Recipe>> {
        let tags = (!filter.tags.is_empty()).then(|| filter.tags.clone());
        let ingredients = (!filter.ingredients.is_empty()).then(|| filter.ingredients.clone());
        let rows = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            SELECT {RECIPE_COLUMNS}
              FROM recipes r
             WHERE r.user_id = $1
               AND ($2::uuid[] IS NULL OR EXISTS (
                    SELECT 1 FROM recipe_tags rt
                     WHERE rt.recipe_id = r.id AND rt.tag_id = ANY($2)))
               AND ($3::uuid[] IS NULL OR EXISTS (
                    SELECT 1 FROM recipe_ingredients ri
                     WHERE ri.recipe_id = r.id AND ri.ingredient_id = ANY($3)))
             ORDER BY r.title DESC
            "#
        ))
        .bind(owner)
        .bind(tags)
        .bind(ingredients)
        .fetch_all(&self.db)
        .await
        .context("list recipes")?;
        Ok(rows)
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        let row = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find recipe")?;
        Ok(row)
    }

    async fn insert(
        &self,
        owner: Uuid,
        new: NewRecipe,
        tags: &[Uuid],
        ingredients: &[Uuid],
    ) -> anyhow::Result<Recipe> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            INSERT INTO recipes (user_id, title, time_minutes, price)
            VALUES ($1, $2, $3, $4)
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(owner)
        .bind(&new.title)
        .bind(new.time_minutes)
        .bind(new.price)
        .fetch_one(&mut *tx)
        .await
        .context("insert recipe")?;
        replace_links_tx(&mut tx, AttributeKind::Tag, recipe.id, tags).await?;
        replace_links_tx(&mut tx, AttributeKind::Ingredient, recipe.id, ingredients).await?;
        tx.commit().await.context("commit tx")?;
        Ok(recipe)
    }

    async fn update(&self, id: Uuid, changes: RecipeChanges) -> anyhow::Result<Option<Recipe>> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            UPDATE recipes
               SET title = COALESCE($2, title),
                   time_minutes = COALESCE($3, time_minutes),
                   price = COALESCE($4, price)
             WHERE id = $1
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.title)
        .bind(changes.time_minutes)
        .bind(changes.price)
        .fetch_optional(&mut *tx)
        .await
        .context("update recipe")?;

        let Some(recipe) = recipe else {
            return Ok(None);
        };
        if let Some(tags) = changes.tags.as_deref() {
            replace_links_tx(&mut tx, AttributeKind::Tag, id, tags).await?;
        }
        if let Some(ingredients) = changes.ingredients.as_deref() {
            replace_links_tx(&mut tx, AttributeKind::Ingredient, id, ingredients).await?;
        }
        tx.commit().await.context("commit tx")?;
        Ok(Some(recipe))
    }

    async fn set_image(&self, id: Uuid, image: Option<&str>) -> anyhow::Result<Option<Recipe>> {
        let row = sqlx::query_as::<_, Recipe>(&format!(
            "UPDATE recipes SET image = $2 WHERE id = $1 RETURNING {RECIPE_COLUMNS}"
        ))
        .bind(id)
        .bind(image)
        .fetch_optional(&self.db)
        .await
        .context("set recipe image")?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        replace_links_tx(&mut tx, AttributeKind::Tag, id, &[]).await?;
        replace_links_tx(&mut tx, AttributeKind::Ingredient, id, &[]).await?;
        let res = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete recipe")?;
        tx.commit().await.context("commit tx")?;
        Ok(res.rows_affected() > 0)
    }

    async fn links(
        &self,
        kind: AttributeKind,
        recipe_ids: &[Uuid],
    ) -> anyhow::Result<Vec<(Uuid, Uuid)>> {
        if recipe_ids.is_empty() {
            return Ok(Vec::new());
        }
        let (join_table, join_col) = kind.join();
        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(&format!(
            "SELECT recipe_id, {join_col} FROM {join_table} WHERE recipe_id = ANY($1)"
        ))
        .bind(recipe_ids)
        .fetch_all(&self.db)
        .await
        .with_context(|| format!("list {join_table}"))?;
        Ok(rows)
    }
}
