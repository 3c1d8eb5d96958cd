use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// The two owner-scoped labels a recipe can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Tag,
    Ingredient,
}

impl AttributeKind {
    pub fn table(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags",
            AttributeKind::Ingredient => "ingredients",
        }
    }

    /// Join table linking recipes to this kind, and its foreign-key column.
    pub fn join(self) -> (&'static str, &'static str) {
        match self {
            AttributeKind::Tag => ("recipe_tags", "tag_id"),
            AttributeKind::Ingredient => ("recipe_ingredients", "ingredient_id"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AttributeKind::Tag => "Tag",
            AttributeKind::Ingredient => "Ingredient",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Attribute {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: OffsetDateTime,
}
