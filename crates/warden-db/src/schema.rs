//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. UUIDs are stored as strings
//! and every pivot relation carries a UNIQUE index over `(in, out)` so an
//! edge can exist at most once. Relations are ENFORCED: an edge whose
//! endpoint record does not exist is rejected, failing the enclosing
//! transaction.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "access_control_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Permission catalogue (seeded, immutable at runtime)
-- =======================================================================
DEFINE TABLE permission SCHEMAFULL;
DEFINE FIELD slug ON TABLE permission TYPE string;
DEFINE FIELD name ON TABLE permission TYPE string;
DEFINE FIELD group_name ON TABLE permission TYPE string;
DEFINE FIELD created_at ON TABLE permission TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_permission_slug ON TABLE permission \
    COLUMNS slug UNIQUE;

-- =======================================================================
-- Roles
-- =======================================================================
DEFINE TABLE role SCHEMAFULL;
DEFINE FIELD name ON TABLE role TYPE string;
DEFINE FIELD slug ON TABLE role TYPE string;
DEFINE FIELD description ON TABLE role TYPE option<string>;
DEFINE FIELD created_at ON TABLE role TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE role TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_role_name ON TABLE role COLUMNS name UNIQUE;
DEFINE INDEX idx_role_slug ON TABLE role COLUMNS slug UNIQUE;

-- =======================================================================
-- Packages
-- =======================================================================
DEFINE TABLE package SCHEMAFULL;
DEFINE FIELD name ON TABLE package TYPE string;
DEFINE FIELD slug ON TABLE package TYPE string;
DEFINE FIELD description ON TABLE package TYPE option<string>;
DEFINE FIELD created_at ON TABLE package TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE package TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_package_name ON TABLE package COLUMNS name UNIQUE;
DEFINE INDEX idx_package_slug ON TABLE package COLUMNS slug UNIQUE;

-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD name ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
-- Nulled when the role is deleted.
DEFINE FIELD role_id ON TABLE user TYPE option<string>;
-- Nulled when the creating account is deleted.
DEFINE FIELD created_by ON TABLE user TYPE option<string>;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;
DEFINE INDEX idx_user_role ON TABLE user COLUMNS role_id;
DEFINE INDEX idx_user_created_by ON TABLE user COLUMNS created_by;

-- =======================================================================
-- Graph Edge Tables (relations)
-- =======================================================================

-- Role -> Permission
DEFINE TABLE grants SCHEMAFULL TYPE RELATION IN role OUT permission ENFORCED;
DEFINE FIELD created_at ON TABLE grants TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_grants_pair ON TABLE grants COLUMNS in, out UNIQUE;

-- Package -> Permission
DEFINE TABLE includes SCHEMAFULL TYPE RELATION IN package OUT permission ENFORCED;
DEFINE FIELD created_at ON TABLE includes TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_includes_pair ON TABLE includes COLUMNS in, out UNIQUE;

-- User -> Package
DEFINE TABLE holds SCHEMAFULL TYPE RELATION IN user OUT package ENFORCED;
DEFINE FIELD created_at ON TABLE holds TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_holds_pair ON TABLE holds COLUMNS in, out UNIQUE;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies each
/// migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

        info!(version = migration.version, "Migration applied");
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn every_pivot_has_a_unique_pair_index() {
        for edge in ["grants", "includes", "holds"] {
            let index = format!("ON TABLE {edge} COLUMNS in, out UNIQUE");
            assert!(SCHEMA_V1.contains(&index), "{edge} lacks a pair index");
        }
    }

    #[test]
    fn every_pivot_is_enforced() {
        for (edge, from, to) in [
            ("grants", "role", "permission"),
            ("includes", "package", "permission"),
            ("holds", "user", "package"),
        ] {
            let ddl =
                format!("DEFINE TABLE {edge} SCHEMAFULL TYPE RELATION IN {from} OUT {to} ENFORCED;");
            assert!(SCHEMA_V1.contains(&ddl), "{edge} is not enforced");
        }
    }
}
