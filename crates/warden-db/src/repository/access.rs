//! SurrealDB implementation of [`AccessRepository`].

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::repository::{AccessRepository, UserGrants};

use crate::error::DbError;

/// One row per user. Slugs come back as `NONE` when an edge points at a
/// permission that no longer exists.
#[derive(Debug, SurrealValue)]
struct GrantsRow {
    role_slug: Vec<String>,
    role_permissions: Vec<Option<String>>,
    package_permissions: Vec<Option<String>>,
}

// Single statement, so the role, its grants and the held packages are read
// from the same snapshot.
const LOAD_GRANTS: &str = "\
SELECT \
    (SELECT VALUE slug FROM role \
        WHERE meta::id(id) = $parent.role_id) AS role_slug, \
    (SELECT VALUE out.slug FROM grants \
        WHERE meta::id(in) = $parent.role_id) AS role_permissions, \
    array::flatten(->holds->package->includes->permission.slug) AS package_permissions \
FROM type::record('user', $user_id)";

#[derive(Clone)]
pub struct SurrealAccessRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAccessRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AccessRepository for SurrealAccessRepository<C> {
    async fn load_grants(&self, user_id: Uuid) -> WardenResult<UserGrants> {
        let mut result = self
            .db
            .query(LOAD_GRANTS)
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GrantsRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: user_id.to_string(),
        })?;

        Ok(UserGrants {
            user_id,
            role_slug: row.role_slug.into_iter().next(),
            role_permissions: row.role_permissions.into_iter().flatten().collect(),
            package_permissions: row.package_permissions.into_iter().flatten().collect(),
        })
    }

    async fn catalogue(&self) -> WardenResult<Vec<String>> {
        let mut result = self
            .db
            .query("SELECT VALUE slug FROM permission ORDER BY slug ASC")
            .await
            .map_err(DbError::from)?;
        let slugs: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(slugs)
    }

    async fn catalogue_contains(&self, slug: &str) -> WardenResult<bool> {
        let mut result = self
            .db
            .query("SELECT VALUE slug FROM permission WHERE slug = $slug LIMIT 1")
            .bind(("slug", slug.to_string()))
            .await
            .map_err(DbError::from)?;
        let found: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(!found.is_empty())
    }
}
