//! SurrealDB implementation of [`PackageRepository`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::edge::EdgeChange;
use warden_core::error::WardenResult;
use warden_core::models::permission::Permission;
use warden_core::models::package::Package;
use warden_core::models::user::User;
use warden_core::repository::{BundleChanges, NewBundle, PackageRepository};

use super::edges::{HOLDS, INCLUDES, run_transaction, transaction};
use super::permission::{PermissionRowWithId, into_permissions};
use super::user::{UserRowWithId, into_users};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
pub(crate) struct PackageRowWithId {
    record_id: String,
    name: String,
    slug: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PackageRowWithId {
    fn try_into_package(self) -> Result<Package, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Corrupt(format!("invalid UUID: {e}")))?;
        Ok(Package {
            id,
            name: self.name,
            slug: self.slug,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub(crate) fn into_packages(rows: Vec<PackageRowWithId>) -> Result<Vec<Package>, DbError> {
    rows.into_iter()
        .map(PackageRowWithId::try_into_package)
        .collect()
}

/// SurrealDB implementation of the Package repository.
#[derive(Clone)]
pub struct SurrealPackageRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPackageRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_one(&self, query: &str, value: String) -> Result<Package, DbError> {
        let mut result = self.db.query(query).bind(("value", value.clone())).await?;
        let rows: Vec<PackageRowWithId> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "package".into(),
            id: value,
        })?;
        row.try_into_package()
    }
}

impl<C: Connection> PackageRepository for SurrealPackageRepository<C> {
    async fn create(&self, input: NewBundle) -> WardenResult<Package> {
        let id = Uuid::new_v4();

        let mut statements = String::from(
            "CREATE type::record('package', $id) SET \
             name = $name, slug = $slug, description = $description \
             RETURN NONE;\n",
        );
        statements.push_str(&INCLUDES.relate(id, &input.permission_ids));

        self.db
            .query(transaction(&statements))
            .bind(("id", id.to_string()))
            .bind(("name", input.name))
            .bind(("slug", input.slug))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<Package> {
        Ok(self
            .fetch_one(
                "SELECT meta::id(id) AS record_id, * FROM type::record('package', $value)",
                id.to_string(),
            )
            .await?)
    }

    async fn get_by_slug(&self, slug: &str) -> WardenResult<Package> {
        Ok(self
            .fetch_one(
                "SELECT meta::id(id) AS record_id, * FROM package WHERE slug = $value",
                slug.to_string(),
            )
            .await?)
    }

    async fn name_taken(&self, name: &str, except: Option<Uuid>) -> WardenResult<bool> {
        let mut result = self
            .db
            .query("SELECT VALUE meta::id(id) FROM package WHERE name = $name")
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;
        let ids: Vec<String> = result.take(0).map_err(DbError::from)?;
        let except = except.map(|id| id.to_string());
        Ok(ids.iter().any(|id| Some(id) != except.as_ref()))
    }

    async fn slug_taken(&self, slug: &str) -> WardenResult<bool> {
        let mut result = self
            .db
            .query("SELECT VALUE meta::id(id) FROM package WHERE slug = $slug")
            .bind(("slug", slug.to_string()))
            .await
            .map_err(DbError::from)?;
        let ids: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(!ids.is_empty())
    }

    async fn update(&self, id: Uuid, input: BundleChanges) -> WardenResult<Package> {
        let mut statements = String::from(
            "UPDATE type::record('package', $id) SET \
             name = $name, description = $description, updated_at = time::now() \
             RETURN NONE;\n",
        );
        match &input.permissions {
            EdgeChange::Detach => statements.push_str(&INCLUDES.detach(id)),
            EdgeChange::Sync(ids) => statements.push_str(&INCLUDES.sync(id, ids)),
        }

        self.db
            .query(transaction(&statements))
            .bind(("id", id.to_string()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_by_id(id).await
    }

    async fn delete(&self, id: Uuid) -> WardenResult<()> {
        // Permission and user edges go first, then the package record.
        let mut statements = INCLUDES.detach(id);
        statements.push_str(&HOLDS.detach_incoming(id));
        statements.push_str("DELETE type::record('package', $id) RETURN NONE;\n");

        self.db
            .query(transaction(&statements))
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list(&self) -> WardenResult<Vec<Package>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM package ORDER BY created_at ASC")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PackageRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(into_packages(rows)?)
    }

    async fn missing_ids(&self, ids: &BTreeSet<Uuid>) -> WardenResult<Vec<Uuid>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let mut result = self
            .db
            .query("SELECT VALUE meta::id(id) FROM package WHERE meta::id(id) INSIDE $ids")
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

    async fn permissions(&self, id: Uuid) -> WardenResult<Vec<Permission>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 WHERE id IN (\
                     SELECT VALUE out FROM includes \
                     WHERE in = type::record('package', $package_id)\
                 ) \
                 ORDER BY group_name ASC, name ASC",
            )
            .bind(("package_id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(into_permissions(rows)?)
    }

    async fn users(&self, id: Uuid) -> WardenResult<Vec<User>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE id IN (\
                     SELECT VALUE in FROM holds \
                     WHERE out = type::record('package', $package_id)\
                 ) \
                 ORDER BY created_at ASC",
            )
            .bind(("package_id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(into_users(rows)?)
    }

    async fn attach_permissions(&self, id: Uuid, ids: &BTreeSet<Uuid>) -> WardenResult<()> {
        self.get_by_id(id).await?;
        Ok(run_transaction(&self.db, transaction(&INCLUDES.attach(id, ids))).await?)
    }

    async fn sync_permissions(&self, id: Uuid, ids: &BTreeSet<Uuid>) -> WardenResult<()> {
        self.get_by_id(id).await?;
        Ok(run_transaction(&self.db, transaction(&INCLUDES.sync(id, ids))).await?)
    }

    async fn detach_permissions(&self, id: Uuid) -> WardenResult<()> {
        self.get_by_id(id).await?;
        Ok(run_transaction(&self.db, transaction(&INCLUDES.detach(id))).await?)
    }
}
