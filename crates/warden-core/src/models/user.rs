//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::edge::EdgeUpdate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Argon2id PHC string. Never leaves the core.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role_id: Option<Uuid>,
    /// Audit link to the account that created this one. Carries no
    /// ownership and is nulled when that account is deleted.
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of the user listing: the user plus the creator's display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub user: User,
    pub created_by_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    /// Raw password (hashed with Argon2id before storage).
    pub password: String,
    #[serde(default)]
    pub role_id: Option<Uuid>,
    #[serde(default)]
    pub package_ids: Vec<Uuid>,
}

/// Administrative request to update a user.
///
/// `role_id` follows the same absence policy as the package edges: leaving
/// it out clears the role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub name: String,
    pub email: String,
    /// Only re-hashed when present.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role_id: Option<Uuid>,
    #[serde(default)]
    pub package_ids: EdgeUpdate,
}
