//! Permission domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An atomic capability gate. The `slug` is the authorization token; the
/// `id` only exists so pivot edges have something to point at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    /// Display grouping (e.g. `users`, `fleet`).
    pub group: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePermission {
    pub slug: String,
    pub name: String,
    pub group: String,
}
