//! SurrealDB implementation of [`UserRepository`].
//!
//! Password hashing uses Argon2id (memory: 19 MiB, iterations: 2,
//! parallelism: 1) with a random salt per hash. An optional pepper can be
//! provided at construction time.

use std::collections::BTreeSet;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use warden_core::edge::EdgeChange;
use warden_core::error::WardenResult;
use warden_core::models::package::Package;
use warden_core::models::user::{User, UserSummary};
use warden_core::repository::{
    NewUser, PaginatedResult, Pagination, UserChanges, UserRepository,
};

use super::edges::{HOLDS, run_transaction, transaction};
use super::package::{PackageRowWithId, into_packages};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
pub(crate) struct UserRowWithId {
    record_id: String,
    name: String,
    email: String,
    password_hash: String,
    role_id: Option<String>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct UserSummaryRow {
    record_id: String,
    name: String,
    email: String,
    password_hash: String,
    role_id: Option<String>,
    created_by: Option<String>,
    created_by_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_id(raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Corrupt(format!("invalid UUID: {e}")))
}

fn parse_optional_id(raw: Option<String>) -> Result<Option<Uuid>, DbError> {
    raw.as_deref().map(parse_id).transpose()
}

impl UserRowWithId {
    pub(crate) fn try_into_user(self) -> Result<User, DbError> {
        Ok(User {
            id: parse_id(&self.record_id)?,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            role_id: parse_optional_id(self.role_id)?,
            created_by: parse_optional_id(self.created_by)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl UserSummaryRow {
    fn try_into_summary(self) -> Result<UserSummary, DbError> {
        let user = User {
            id: parse_id(&self.record_id)?,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            role_id: parse_optional_id(self.role_id)?,
            created_by: parse_optional_id(self.created_by)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        Ok(UserSummary {
            user,
            created_by_name: self.created_by_name,
        })
    }
}

pub(crate) fn into_users(rows: Vec<UserRowWithId>) -> Result<Vec<User>, DbError> {
    rows.into_iter().map(UserRowWithId::try_into_user).collect()
}

/// Hash a password with Argon2id.
///
/// If a pepper is provided, it is prepended to the password before
/// hashing. The salt is randomly generated for each call.
fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Hash(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input, &salt)
        .map_err(|e| DbError::Hash(format!("password hash error: {e}")))?;

    Ok(hash.to_string())
}

/// Verify a password against an Argon2id hash produced by this repository.
pub fn verify_password(password: &str, hash: &str, pepper: Option<&str>) -> Result<bool, DbError> {
    use argon2::PasswordVerifier;

    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| DbError::Hash(format!("invalid hash format: {e}")))?;

    match Argon2::default().verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(DbError::Hash(format!("verify error: {e}"))),
    }
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    /// Optional server-side pepper for password hashing.
    pepper: Option<String>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self {
            db,
            pepper: Some(pepper),
        }
    }

    async fn fetch_one(&self, query: &str, value: String) -> Result<User, DbError> {
        let mut result = self.db.query(query).bind(("value", value.clone())).await?;
        let rows: Vec<UserRowWithId> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: value,
        })?;
        row.try_into_user()
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: NewUser) -> WardenResult<User> {
        let id = Uuid::new_v4();
        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;

        let mut statements = String::from(
            "CREATE type::record('user', $id) SET \
             name = $name, email = $email, password_hash = $password_hash, \
             role_id = $role_id, created_by = $created_by \
             RETURN NONE;\n",
        );
        statements.push_str(&HOLDS.relate(id, &input.package_ids));

        self.db
            .query(transaction(&statements))
            .bind(("id", id.to_string()))
            .bind(("name", input.name))
            .bind(("email", input.email))
            .bind(("password_hash", password_hash))
            .bind(("role_id", input.role_id.map(|r| r.to_string())))
            .bind(("created_by", input.created_by.map(|c| c.to_string())))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> WardenResult<User> {
        Ok(self
            .fetch_one(
                "SELECT meta::id(id) AS record_id, * FROM type::record('user', $value)",
                id.to_string(),
            )
            .await?)
    }

    async fn get_by_email(&self, email: &str) -> WardenResult<User> {
        Ok(self
            .fetch_one(
                "SELECT meta::id(id) AS record_id, * FROM user WHERE email = $value",
                email.to_string(),
            )
            .await?)
    }

    async fn email_taken(&self, email: &str, except: Option<Uuid>) -> WardenResult<bool> {
        let mut result = self
            .db
            .query("SELECT VALUE meta::id(id) FROM user WHERE email = $email")
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;
        let ids: Vec<String> = result.take(0).map_err(DbError::from)?;
        let except = except.map(|id| id.to_string());
        Ok(ids.iter().any(|id| Some(id) != except.as_ref()))
    }

    async fn update(&self, id: Uuid, input: UserChanges) -> WardenResult<User> {
        let password_hash = input
            .password
            .as_deref()
            .map(|p| hash_password(p, self.pepper.as_deref()))
            .transpose()?;

        let mut statements = String::from(
            "UPDATE type::record('user', $id) SET \
             name = $name, email = $email, role_id = $role_id, \
             updated_at = time::now() \
             RETURN NONE;\n",
        );
        if password_hash.is_some() {
            statements.push_str(
                "UPDATE type::record('user', $id) SET password_hash = $password_hash \
                 RETURN NONE;\n",
            );
        }
        match &input.packages {
            EdgeChange::Detach => statements.push_str(&HOLDS.detach(id)),
            EdgeChange::Sync(ids) => statements.push_str(&HOLDS.sync(id, ids)),
        }

        self.db
            .query(transaction(&statements))
            .bind(("id", id.to_string()))
            .bind(("name", input.name))
            .bind(("email", input.email))
            .bind(("role_id", input.role_id.map(|r| r.to_string())))
            .bind(("password_hash", password_hash))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        self.get_by_id(id).await
    }

    async fn delete(&self, id: Uuid) -> WardenResult<()> {
        // Package edges and creator links go first, then the user record.
        let mut statements = HOLDS.detach(id);
        statements.push_str(
            "UPDATE user SET created_by = NONE \
             WHERE created_by = $id RETURN NONE;\n\
             DELETE type::record('user', $id) RETURN NONE;\n",
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

    async fn list(&self, pagination: Pagination) -> WardenResult<PaginatedResult<UserSummary>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM user GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, *, \
                 (SELECT VALUE name FROM user \
                  WHERE meta::id(id) = $parent.created_by)[0] AS created_by_name \
                 FROM user \
                 ORDER BY created_at DESC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserSummaryRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(UserSummaryRow::try_into_summary)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn packages(&self, id: Uuid) -> WardenResult<Vec<Package>> {
        self.get_by_id(id).await?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM package \
                 WHERE id IN (\
                     SELECT VALUE out FROM holds \
                     WHERE in = type::record('user', $user_id)\
                 ) \
                 ORDER BY name ASC",
            )
            .bind(("user_id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PackageRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(into_packages(rows)?)
    }

    async fn sync_packages(&self, id: Uuid, ids: &BTreeSet<Uuid>) -> WardenResult<()> {
        self.get_by_id(id).await?;
        Ok(run_transaction(&self.db, transaction(&HOLDS.sync(id, ids))).await?)
    }

    async fn detach_packages(&self, id: Uuid) -> WardenResult<()> {
        self.get_by_id(id).await?;
        Ok(run_transaction(&self.db, transaction(&HOLDS.detach(id))).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("s3cret!", None).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("s3cret!", &hash, None).unwrap());
        assert!(!verify_password("wrong", &hash, None).unwrap());
    }

    #[test]
    fn pepper_changes_the_input() {
        let hash = hash_password("s3cret!", Some("pepper")).unwrap();
        assert!(verify_password("s3cret!", &hash, Some("pepper")).unwrap());
        assert!(!verify_password("s3cret!", &hash, None).unwrap());
    }

    #[test]
    fn empty_optional_ids_parse_to_none() {
        assert_eq!(parse_optional_id(None).unwrap(), None);
        assert!(parse_optional_id(Some("not-a-uuid".into())).is_err());
    }
}
