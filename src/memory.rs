//! In-process repositories used by `AppState::fake()`.

use std::cmp::Reverse;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::attributes::repo::AttributeRepo;
use crate::attributes::repo_types::{Attribute, AttributeKind};
use crate::auth::repo::UserRepo;
use crate::auth::repo_types::{NewUser, User};
use crate::recipes::repo::RecipeRepo;
use crate::recipes::repo_types::{NewRecipe, Recipe, RecipeChanges, RecipeFilter};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    tags: Vec<Attribute>,
    ingredients: Vec<Attribute>,
    recipes: Vec<Recipe>,
    recipe_tags: Vec<(Uuid, Uuid)>,
    recipe_ingredients: Vec<(Uuid, Uuid)>,
}

impl Inner {
    fn attrs(&self, kind: AttributeKind) -> &Vec<Attribute> {
        match kind {
            AttributeKind::Tag => &self.tags,
            AttributeKind::Ingredient => &self.ingredients,
        }
    }

    fn attrs_mut(&mut self, kind: AttributeKind) -> &mut Vec<Attribute> {
        match kind {
            AttributeKind::Tag => &mut self.tags,
            AttributeKind::Ingredient => &mut self.ingredients,
        }
    }

    fn links(&self, kind: AttributeKind) -> &Vec<(Uuid, Uuid)> {
        match kind {
            AttributeKind::Tag => &self.recipe_tags,
            AttributeKind::Ingredient => &self.recipe_ingredients,
        }
    }

    fn links_mut(&mut self, kind: AttributeKind) -> &mut Vec<(Uuid, Uuid)> {
        match kind {
            AttributeKind::Tag => &mut self.recipe_tags,
            AttributeKind::Ingredient => &mut self.recipe_ingredients,
        }
    }

    fn replace_links(&mut self, kind: AttributeKind, recipe_id: Uuid, ids: &[Uuid]) {
        let links = self.links_mut(kind);
        links.retain(|(r, _)| *r != recipe_id);
        links.extend(ids.iter().map(|a| (recipe_id, *a)));
    }

    fn matches(&self, kind: AttributeKind, recipe_id: Uuid, wanted: &[Uuid]) -> bool {
        wanted.is_empty()
            || self
                .links(kind)
                .iter()
                .any(|(r, a)| *r == recipe_id && wanted.contains(a))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn deactivate_user(&self, id: Uuid) {
        let mut g = self.inner.write().await;
        if let Some(u) = g.users.iter_mut().find(|u| u.id == id) {
            u.is_active = false;
        }
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let g = self.inner.read().await;
        Ok(g.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let g = self.inner.read().await;
        Ok(g.users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert(&self, new: NewUser) -> anyhow::Result<User> {
        let mut g = self.inner.write().await;
        if g.users.iter().any(|u| u.email == new.email) {
            anyhow::bail!("duplicate email {}", new.email);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            name: new.name,
            password_hash: new.password_hash,
            is_active: true,
            is_staff: new.is_staff,
            is_superuser: new.is_superuser,
            created_at: OffsetDateTime::now_utc(),
        };
        g.users.push(user.clone());
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        password_hash: Option<String>,
    ) -> anyhow::Result<Option<User>> {
        let mut g = self.inner.write().await;
        let Some(user) = g.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(name) = name {
            user.name = name;
        }
        if let Some(hash) = password_hash {
            user.password_hash = hash;
        }
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl AttributeRepo for MemoryStore {
    async fn list(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        assigned_only: bool,
    ) -> anyhow::Result<Vec<Attribute>> {
        let g = self.inner.read().await;
        let links = g.links(kind);
        let mut rows: Vec<Attribute> = g
            .attrs(kind)
            .iter()
            .filter(|a| a.user_id == owner)
            .filter(|a| !assigned_only || links.iter().any(|(_, id)| *id == a.id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(rows)
    }

    async fn insert(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        name: &str,
    ) -> anyhow::Result<Attribute> {
        let mut g = self.inner.write().await;
        let row = Attribute {
            id: Uuid::new_v4(),
            user_id: owner,
            name: name.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        g.attrs_mut(kind).push(row.clone());
        Ok(row)
    }

    async fn find(&self, kind: AttributeKind, id: Uuid) -> anyhow::Result<Option<Attribute>> {
        let g = self.inner.read().await;
        Ok(g.attrs(kind).iter().find(|a| a.id == id).cloned())
    }

    async fn find_many(&self, kind: AttributeKind, ids: &[Uuid]) -> anyhow::Result<Vec<Attribute>> {
        let g = self.inner.read().await;
        Ok(g.attrs(kind)
            .iter()
            .filter(|a| ids.contains(&a.id))
            .cloned()
            .collect())
    }

    async fn delete(&self, kind: AttributeKind, id: Uuid) -> anyhow::Result<bool> {
        let mut g = self.inner.write().await;
        g.links_mut(kind).retain(|(_, a)| *a != id);
        let rows = g.attrs_mut(kind);
        let before = rows.len();
        rows.retain(|a| a.id != id);
        Ok(rows.len() < before)
    }
}

#[async_trait]
impl RecipeRepo for MemoryStore {
    async fn list(&self, owner: Uuid, filter: &RecipeFilter) -> anyhow::Result<Vec<Recipe>> {
        let g = self.inner.read().await;
        let mut rows: Vec<Recipe> = g
            .recipes
            .iter()
            .filter(|r| r.user_id == owner)
            .filter(|r| g.matches(AttributeKind::Tag, r.id, &filter.tags))
            .filter(|r| g.matches(AttributeKind::Ingredient, r.id, &filter.ingredients))
            .cloned()
            .collect();
        rows.sort_by_key(|r| Reverse(r.title.clone()));
        Ok(rows)
    }

    async fn find(&self, id: Uuid) -> anyhow::Result<Option<Recipe>> {
        let g = self.inner.read().await;
        Ok(g.recipes.iter().find(|r| r.id == id).cloned())
    }

    async fn insert(
        &self,
        owner: Uuid,
        new: NewRecipe,
        tags: &[Uuid],
        ingredients: &[Uuid],
    ) -> anyhow::Result<Recipe> {
        let mut g = self.inner.write().await;
        let recipe = Recipe {
            id: Uuid::new_v4(),
            user_id: owner,
            title: new.title,
            time_minutes: new.time_minutes,
            price: new.price,
            image: None,
            created_at: OffsetDateTime::now_utc(),
        };
        g.recipes.push(recipe.clone());
        g.replace_links(AttributeKind::Tag, recipe.id, tags);
        g.replace_links(AttributeKind::Ingredient, recipe.id, ingredients);
        Ok(recipe)
    }

    async fn update(&self, id: Uuid, changes: RecipeChanges) -> anyhow::Result<Option<Recipe>> {
        let mut g = self.inner.write().await;
        let Some(recipe) = g.recipes.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            recipe.title = title;
        }
        if let Some(minutes) = changes.time_minutes {
            recipe.time_minutes = minutes;
        }
        if let Some(price) = changes.price {
            recipe.price = price;
        }
        let updated = recipe.clone();
        if let Some(tags) = changes.tags.as_deref() {
            g.replace_links(AttributeKind::Tag, id, tags);
        }
        if let Some(ingredients) = changes.ingredients.as_deref() {
            g.replace_links(AttributeKind::Ingredient, id, ingredients);
        }
        Ok(Some(updated))
    }

    async fn set_image(&self, id: Uuid, image: Option<&str>) -> anyhow::Result<Option<Recipe>> {
        let mut g = self.inner.write().await;
        let Some(recipe) = g.recipes.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        recipe.image = image.map(str::to_string);
        Ok(Some(recipe.clone()))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut g = self.inner.write().await;
        g.replace_links(AttributeKind::Tag, id, &[]);
        g.replace_links(AttributeKind::Ingredient, id, &[]);
        let before = g.recipes.len();
        g.recipes.retain(|r| r.id != id);
        Ok(g.recipes.len() < before)
    }

    async fn links(
        &self,
        kind: AttributeKind,
        recipe_ids: &[Uuid],
    ) -> anyhow::Result<Vec<(Uuid, Uuid)>> {
        let g = self.inner.read().await;
        Ok(g.links(kind)
            .iter()
            .filter(|(r, _)| recipe_ids.contains(r))
            .copied()
            .collect())
    }
}
