use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Attribute, AttributeKind};

#[async_trait]
pub trait AttributeRepo: Send + Sync {
    /// Rows owned by `owner`, ordered by name descending.
    async fn list(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        assigned_only: bool,
    ) -> anyhow::Result<Vec<Attribute>>;
    async fn insert(&self, kind: AttributeKind, owner: Uuid, name: &str)
        -> anyhow::Result<Attribute>;
    async fn find(&self, kind: AttributeKind, id: Uuid) -> anyhow::Result<Option<Attribute>>;
    async fn find_many(&self, kind: AttributeKind, ids: &[Uuid]) -> anyhow::Result<Vec<Attribute>>;
    /// Removes the row and every recipe association pointing at it.
    async fn delete(&self, kind: AttributeKind, id: Uuid) -> anyhow::Result<bool>;
}

pub struct PgAttributeRepo {
    db: PgPool,
}

impl PgAttributeRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AttributeRepo for PgAttributeRepo {
    async fn list(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        assigned_only: bool,
    ) -> anyhow::Result<Vec<Attribute>> {
        let table = kind.table();
        let (join_table, join_col) = kind.join();
        let sql = if assigned_only {
            format!(
                r#"
                SELECT a.id, a.user_id, a.name, a.created_at
                  FROM {table} a
                 WHERE a.user_id = $1
                   AND EXISTS (SELECT 1 FROM {join_table} j WHERE j.{join_col} = a.id)
                 ORDER BY a.name DESC
                "#
            )
        } else {
            format!(
                r#"
                SELECT id, user_id, name, created_at
                  FROM {table}
                 WHERE user_id = $1
                 ORDER BY name DESC
                "#
            )
        };
        let rows = sqlx::query_as::<_, Attribute>(&sql)
            .bind(owner)
            .fetch_all(&self.db)
            .await
            .with_context(|| format!("list {table}"))?;
        Ok(rows)
    }

    async fn insert(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        name: &str,
    ) -> anyhow::Result<Attribute> {
        let table = kind.table();
        let row = sqlx::query_as::<_, Attribute>(&format!(
            r#"
            INSERT INTO {table} (user_id, name)
            VALUES ($1, $2)
            RETURNING id, user_id, name, created_at
            "#
        ))
        .bind(owner)
        .bind(name)
        .fetch_one(&self.db)
        .await
        .with_context(|| format!("insert into {table}"))?;
        Ok(row)
    }

    async fn find(&self, kind: AttributeKind, id: Uuid) -> anyhow::Result<Option<Attribute>> {
        let table = kind.table();
        let row = sqlx::query_as::<_, Attribute>(&format!(
            "SELECT id, user_id, name, created_at FROM {table} WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .with_context(|| format!("find in {table}"))?;
        Ok(row)
    }

    async fn find_many(&self, kind: AttributeKind, ids: &[Uuid]) -> anyhow::Result<Vec<Attribute>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let table = kind.table();
        let rows = sqlx::query_as::<_, Attribute>(&format!(
            "SELECT id, user_id, name, created_at FROM {table} WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.db)
        .await
        .with_context(|| format!("find many in {table}"))?;
        Ok(rows)
    }

    async fn delete(&self, kind: AttributeKind, id: Uuid) -> anyhow::Result<bool> {
        let table = kind.table();
        let (join_table, join_col) = kind.join();
        let mut tx = self.db.begin().await.context("begin tx")?;
        sqlx::query(&format!("DELETE FROM {join_table} WHERE {join_col} = $1"))
            .bind(id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("delete from {join_table}"))?;
        let res = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
            .bind(id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("delete from {table}"))?;
        tx.commit().await.context("commit tx")?;
        Ok(res.rows_affected() > 0)
    }
}
