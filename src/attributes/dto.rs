use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::Attribute;

#[derive(Debug, Deserialize)]
pub struct CreateAttributeRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListAttributesQuery {
    /// `1` limits the listing to attributes used by at least one recipe.
    #[serde(default)]
    pub assigned_only: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeResponse {
    pub id: Uuid,
    pub name: String,
}

impl From<Attribute> for AttributeResponse {
    fn from(a: Attribute) -> Self {
        Self { id: a.id, name: a.name }
    }
}
