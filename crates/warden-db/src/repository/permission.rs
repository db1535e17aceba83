//! SurrealDB implementation of [`PermissionRepository`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::permission::{CreatePermission, Permission};
use warden_core::repository::PermissionRepository;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct PermissionRow {
    slug: String,
    name: String,
    group_name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
pub(crate) struct PermissionRowWithId {
    pub record_id: String,
    pub slug: String,
    pub name: String,
    pub group_name: String,
    pub created_at: DateTime<Utc>,
}

impl PermissionRowWithId {
    pub(crate) fn try_into_permission(self) -> Result<Permission, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Corrupt(format!("invalid UUID: {e}")))?;
        Ok(Permission {
            id,
            slug: self.slug,
            name: self.name,
            group: self.group_name,
            created_at: self.created_at,
        })
    }
}

pub(crate) fn into_permissions(rows: Vec<PermissionRowWithId>) -> Result<Vec<Permission>, DbError> {
    rows.into_iter()
        .map(PermissionRowWithId::try_into_permission)
        .collect()
}

/// SurrealDB implementation of the Permission repository.
#[derive(Clone)]
pub struct SurrealPermissionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPermissionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Run a lookup bound to `$value` and expect exactly one row.
    async fn fetch_one(&self, query: &str, value: String) -> Result<Permission, DbError> {
        let mut result = self.db.query(query).bind(("value", value.clone())).await?;
        let rows: Vec<PermissionRowWithId> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "permission".into(),
            id: value,
        })?;
        row.try_into_permission()
    }
}

impl<C: Connection> PermissionRepository for SurrealPermissionRepository<C> {
    async fn create(&self, input: CreatePermission) -> WardenResult<Permission> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('permission', $id) SET \
                 slug = $slug, name = $name, group_name = $group",
            )
            .bind(("id", id_str.clone()))
            .bind(("slug", input.slug))
            .bind(("name", input.name))
            .bind(("group", input.group))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "permission".into(),
            id: id_str,
        })?;

        Ok(Permission {
            id,
            slug: row.slug,
            name: row.name,
            group: row.group_name,
            created_at: row.created_at,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<Permission> {
        Ok(self
            .fetch_one(
                "SELECT meta::id(id) AS record_id, * FROM type::record('permission', $value)",
                id.to_string(),
            )
            .await?)
    }

    async fn get_by_slug(&self, slug: &str) -> WardenResult<Permission> {
        Ok(self
            .fetch_one(
                "SELECT meta::id(id) AS record_id, * FROM permission WHERE slug = $value",
                slug.to_string(),
            )
            .await?)
    }

    async fn list(&self) -> WardenResult<Vec<Permission>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 ORDER BY group_name ASC, name ASC",
            )
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(into_permissions(rows)?)
    }

    async fn missing_ids(&self, ids: &BTreeSet<Uuid>) -> WardenResult<Vec<Uuid>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let mut result = self
            .db
            .query("SELECT VALUE meta::id(id) FROM permission WHERE meta::id(id) INSIDE $ids")
            .bind(("ids", wanted))
            .await
            .map_err(DbError::from)?;

        let found: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(ids
            .iter()
            .filter(|id| !found.contains(&id.to_string()))
            .copied()
            .collect())
    }
}
