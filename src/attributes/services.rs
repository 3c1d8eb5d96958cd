use tracing::{info, warn};
use uuid::Uuid;

use super::repo_types::{Attribute, AttributeKind};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub const MAX_NAME_LEN: usize = 255;

pub async fn list(
    st: &AppState,
    kind: AttributeKind,
    owner: Uuid,
    assigned_only: bool,
) -> AppResult<Vec<Attribute>> {
    let mut rows = st.attributes.list(kind, owner, assigned_only).await?;
    rows.retain(|a| a.user_id == owner);
    Ok(rows)
}

pub async fn create(
    st: &AppState,
    kind: AttributeKind,
    owner: Uuid,
    name: &str,
) -> AppResult<Attribute> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation(format!(
            "{} name cannot be empty",
            kind.label()
        )));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "{} name must be at most {MAX_NAME_LEN} characters",
            kind.label()
        )));
    }
    let row = st.attributes.insert(kind, owner, name).await?;
    info!(kind = kind.label(), id = %row.id, %owner, "attribute created");
    Ok(row)
}

pub async fn delete(st: &AppState, kind: AttributeKind, owner: Uuid, id: Uuid) -> AppResult<()> {
    let not_found = || AppError::not_found(format!("{} not found", kind.label()));
    match st.attributes.find(kind, id).await? {
        Some(row) if row.user_id == owner => {}
        Some(_) => {
            warn!(kind = kind.label(), %id, %owner, "delete of foreign attribute");
            return Err(not_found());
        }
        None => return Err(not_found()),
    }
    if !st.attributes.delete(kind, id).await? {
        return Err(not_found());
    }
    info!(kind = kind.label(), %id, %owner, "attribute deleted");
    Ok(())
}

/// Resolves ids to attributes owned by `owner`; any unknown or foreign id is
/// a validation error so that other users' ids are indistinguishable from
/// missing ones. Duplicates collapse, first occurrence wins.
pub async fn resolve_owned(
    st: &AppState,
    kind: AttributeKind,
    owner: Uuid,
    ids: &[Uuid],
) -> AppResult<Vec<Uuid>> {
    let mut unique: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }
    if unique.is_empty() {
        return Ok(unique);
    }
    let found = st.attributes.find_many(kind, &unique).await?;
    for id in &unique {
        if !found.iter().any(|a| a.id == *id && a.user_id == owner) {
            return Err(AppError::validation(format!(
                "Invalid {} id \"{id}\" - object does not exist",
                kind.label().to_lowercase()
            )));
        }
    }
    Ok(unique)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_is_scoped_and_sorted_by_name_desc() {
        let st = AppState::fake();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        create(&st, AttributeKind::Tag, me, "Vegan").await.unwrap();
        create(&st, AttributeKind::Tag, me, "Dessert").await.unwrap();
        create(&st, AttributeKind::Tag, other, "Harty").await.unwrap();

        let names: Vec<String> = list(&st, AttributeKind::Tag, me, false)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Vegan", "Dessert"]);

        let theirs = list(&st, AttributeKind::Tag, other, false).await.unwrap();
        assert_eq!(theirs.len(), 1);
        assert_eq!(theirs[0].name, "Harty");
    }

    #[tokio::test]
    async fn kinds_do_not_mix() {
        let st = AppState::fake();
        let me = Uuid::new_v4();
        create(&st, AttributeKind::Tag, me, "Vegan").await.unwrap();
        create(&st, AttributeKind::Ingredient, me, "Salt").await.unwrap();
        let ingredients = list(&st, AttributeKind::Ingredient, me, false).await.unwrap();
        assert_eq!(ingredients.len(), 1);
        assert_eq!(ingredients[0].name, "Salt");
    }

    #[tokio::test]
    async fn empty_name_rejected_without_insert() {
        let st = AppState::fake();
        let me = Uuid::new_v4();
        for kind in [AttributeKind::Tag, AttributeKind::Ingredient] {
            for name in ["", "   "] {
                let err = create(&st, kind, me, name).await.unwrap_err();
                assert!(matches!(err, AppError::Validation(_)));
            }
            assert!(list(&st, kind, me, false).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn overlong_name_rejected() {
        let st = AppState::fake();
        let name = "x".repeat(MAX_NAME_LEN + 1);
        let err = create(&st, AttributeKind::Tag, Uuid::new_v4(), &name).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn duplicate_names_allowed() {
        let st = AppState::fake();
        let me = Uuid::new_v4();
        let a = create(&st, AttributeKind::Tag, me, "Spicy").await.unwrap();
        let b = create(&st, AttributeKind::Tag, me, "Spicy").await.unwrap();
        assert_ne!(a.id, b.id);
        let c = create(&st, AttributeKind::Tag, Uuid::new_v4(), "Spicy").await.unwrap();
        assert_ne!(a.id, c.id);
    }

    #[tokio::test]
    async fn name_is_trimmed() {
        let st = AppState::fake();
        let tag = create(&st, AttributeKind::Tag, Uuid::new_v4(), "  Potatoy ").await.unwrap();
        assert_eq!(tag.name, "Potatoy");
    }

    #[tokio::test]
    async fn delete_requires_ownership() {
        let st = AppState::fake();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let tag = create(&st, AttributeKind::Tag, me, "Mine").await.unwrap();

        let err = delete(&st, AttributeKind::Tag, other, tag.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(list(&st, AttributeKind::Tag, me, false).await.unwrap().len(), 1);

        // wrong kind is also not found
        let err = delete(&st, AttributeKind::Ingredient, me, tag.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        delete(&st, AttributeKind::Tag, me, tag.id).await.unwrap();
        assert!(list(&st, AttributeKind::Tag, me, false).await.unwrap().is_empty());

        let err = delete(&st, AttributeKind::Tag, me, tag.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn resolve_owned_rejects_foreign_and_unknown_ids() {
        let st = AppState::fake();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mine = create(&st, AttributeKind::Tag, me, "Mine").await.unwrap();
        let theirs = create(&st, AttributeKind::Tag, other, "Theirs").await.unwrap();

        let ids = resolve_owned(&st, AttributeKind::Tag, me, &[mine.id, mine.id])
            .await
            .unwrap();
        assert_eq!(ids, vec![mine.id]);

        let err = resolve_owned(&st, AttributeKind::Tag, me, &[mine.id, theirs.id])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = resolve_owned(&st, AttributeKind::Tag, me, &[Uuid::new_v4()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = resolve_owned(&st, AttributeKind::Ingredient, me, &[mine.id])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
