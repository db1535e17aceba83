//! SurrealDB implementation of [`RoleRepository`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::edge::EdgeChange;
use warden_core::error::WardenResult;
use warden_core::models::permission::Permission;
use warden_core::models::role::Role;
use warden_core::repository::{BundleChanges, NewBundle, RoleRepository};

use super::edges::{GRANTS, run_transaction, transaction};
use super::permission::{PermissionRowWithId, into_permissions};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct RoleRowWithId {
    record_id: String,
    name: String,
    slug: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoleRowWithId {
    fn try_into_role(self) -> Result<Role, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Corrupt(format!("invalid UUID: {e}")))?;
        Ok(Role {
            id,
            name: self.name,
            slug: self.slug,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Role repository.
#[derive(Clone)]
pub struct SurrealRoleRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_one(&self, query: &str, value: String) -> Result<Role, DbError> {
        let mut result = self.db.query(query).bind(("value", value.clone())).await?;
        let rows: Vec<RoleRowWithId> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: value,
        })?;
        row.try_into_role()
    }
}

impl<C: Connection> RoleRepository for SurrealRoleRepository<C> {
    async fn create(&self, input: NewBundle) -> WardenResult<Role> {
        let id = Uuid::new_v4();

        let mut statements = String::from(
            "CREATE type::record('role', $id) SET \
             name = $name, slug = $slug, description = $description \
             RETURN NONE;\n",
        );
        statements.push_str(&GRANTS.relate(id, &input.permission_ids));

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

    async fn get_by_id(&self, id: Uuid) -> WardenResult<Role> {
        Ok(self
            .fetch_one(
                "SELECT meta::id(id) AS record_id, * FROM type::record('role', $value)",
                id.to_string(),
            )
            .await?)
    }

    async fn get_by_slug(&self, slug: &str) -> WardenResult<Role> {
        Ok(self
            .fetch_one(
                "SELECT meta::id(id) AS record_id, * FROM role WHERE slug = $value",
                slug.to_string(),
            )
            .await?)
    }

    async fn name_taken(&self, name: &str, except: Option<Uuid>) -> WardenResult<bool> {
        let mut result = self
            .db
            .query("SELECT VALUE meta::id(id) FROM role WHERE name = $name")
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
            .query("SELECT VALUE meta::id(id) FROM role WHERE slug = $slug")
            .bind(("slug", slug.to_string()))
            .await
            .map_err(DbError::from)?;
        let ids: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(!ids.is_empty())
    }

    async fn update(&self, id: Uuid, input: BundleChanges) -> WardenResult<Role> {
        let mut statements = String::from(
            "UPDATE type::record('role', $id) SET \
             name = $name, description = $description, updated_at = time::now() \
             RETURN NONE;\n",
        );
        match &input.permissions {
            EdgeChange::Detach => statements.push_str(&GRANTS.detach(id)),
            EdgeChange::Sync(ids) => statements.push_str(&GRANTS.sync(id, ids)),
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
        // Grant edges and user references go first, then the role record.
        let mut statements = GRANTS.detach(id);
        statements.push_str(
            "UPDATE user SET role_id = NONE, updated_at = time::now() \
             WHERE role_id = $id RETURN NONE;\n\
             DELETE type::record('role', $id) RETURN NONE;\n",
        );

        self.db
            .query(transaction(&statements))
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list(&self) -> WardenResult<Vec<Role>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM role ORDER BY created_at ASC")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRowWithId> = result.take(0).map_err(DbError::from)?;
        let roles = rows
            .into_iter()
            .map(|row| row.try_into_role())
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(roles)
    }

    async fn permissions(&self, id: Uuid) -> WardenResult<Vec<Permission>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 WHERE id IN (\
                     SELECT VALUE out FROM grants \
                     WHERE in = type::record('role', $role_id)\
                 ) \
                 ORDER BY group_name ASC, name ASC",
            )
            .bind(("role_id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(into_permissions(rows)?)
    }

    async fn attach_permissions(&self, id: Uuid, ids: &BTreeSet<Uuid>) -> WardenResult<()> {
        self.get_by_id(id).await?;
        Ok(run_transaction(&self.db, transaction(&GRANTS.attach(id, ids))).await?)
    }

    async fn sync_permissions(&self, id: Uuid, ids: &BTreeSet<Uuid>) -> WardenResult<()> {
        self.get_by_id(id).await?;
        Ok(run_transaction(&self.db, transaction(&GRANTS.sync(id, ids))).await?)
    }

    async fn detach_permissions(&self, id: Uuid) -> WardenResult<()> {
        self.get_by_id(id).await?;
        Ok(run_transaction(&self.db, transaction(&GRANTS.detach(id))).await?)
    }
}
