//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Every write that touches more than
//! one row (an entity plus its pivot edges) is expected to run in a single
//! transaction so readers never observe a half-applied edge set.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::edge::EdgeChange;
use crate::error::WardenResult;
use crate::models::{
    package::Package,
    permission::{CreatePermission, Permission},
    role::Role,
    user::{User, UserSummary},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Validated values for a new role or package. The slug is already
/// derived and checked for uniqueness.
#[derive(Debug, Clone)]
pub struct NewBundle {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub permission_ids: BTreeSet<Uuid>,
}

/// Validated replacement values for a role or package.
#[derive(Debug, Clone)]
pub struct BundleChanges {
    pub name: String,
    pub description: Option<String>,
    pub permissions: EdgeChange,
}

/// Validated values for a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    /// Raw password; the repository stores only its hash.
    pub password: String,
    pub role_id: Option<Uuid>,
    pub package_ids: BTreeSet<Uuid>,
    pub created_by: Option<Uuid>,
}

/// Validated replacement values for a user.
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
    pub role_id: Option<Uuid>,
    pub packages: EdgeChange,
}

/// Everything the resolver needs about one user, read as one consistent
/// snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserGrants {
    pub user_id: Uuid,
    pub role_slug: Option<String>,
    /// Slugs reachable through the role's grant edges.
    pub role_permissions: Vec<String>,
    /// Slugs reachable through every held package, duplicates included.
    pub package_permissions: Vec<String>,
}

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

pub trait PermissionRepository: Send + Sync {
    /// Only used by the seed process; the catalogue is fixed at runtime.
    fn create(
        &self,
        input: CreatePermission,
    ) -> impl Future<Output = WardenResult<Permission>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<Permission>> + Send;
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = WardenResult<Permission>> + Send;
    /// The whole catalogue ordered by group, then name.
    fn list(&self) -> impl Future<Output = WardenResult<Vec<Permission>>> + Send;
    /// The subset of `ids` with no permission row behind it.
    fn missing_ids(
        &self,
        ids: &BTreeSet<Uuid>,
    ) -> impl Future<Output = WardenResult<Vec<Uuid>>> + Send;
}

// ---------------------------------------------------------------------------
// Roles & packages
// ---------------------------------------------------------------------------

pub trait RoleRepository: Send + Sync {
    /// Create the role and attach its permissions in one transaction.
    fn create(&self, input: NewBundle) -> impl Future<Output = WardenResult<Role>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<Role>> + Send;
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = WardenResult<Role>> + Send;
    /// Whether another role (other than `except`) already uses `name`.
    fn name_taken(
        &self,
        name: &str,
        except: Option<Uuid>,
    ) -> impl Future<Output = WardenResult<bool>> + Send;
    fn slug_taken(&self, slug: &str) -> impl Future<Output = WardenResult<bool>> + Send;
    /// Replace the role's fields and apply the permission change in one
    /// transaction.
    fn update(
        &self,
        id: Uuid,
        input: BundleChanges,
    ) -> impl Future<Output = WardenResult<Role>> + Send;
    /// Detach grant edges, clear the role from its users, then remove the row.
    fn delete(&self, id: Uuid) -> impl Future<Output = WardenResult<()>> + Send;
    fn list(&self) -> impl Future<Output = WardenResult<Vec<Role>>> + Send;

    fn permissions(&self, id: Uuid) -> impl Future<Output = WardenResult<Vec<Permission>>> + Send;
    /// Add edges for `ids` that do not exist yet; keep the rest.
    fn attach_permissions(
        &self,
        id: Uuid,
        ids: &BTreeSet<Uuid>,
    ) -> impl Future<Output = WardenResult<()>> + Send;
    /// Make the edge set exactly `ids`.
    fn sync_permissions(
        &self,
        id: Uuid,
        ids: &BTreeSet<Uuid>,
    ) -> impl Future<Output = WardenResult<()>> + Send;
    fn detach_permissions(&self, id: Uuid) -> impl Future<Output = WardenResult<()>> + Send;
}

pub trait PackageRepository: Send + Sync {
    fn create(&self, input: NewBundle) -> impl Future<Output = WardenResult<Package>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<Package>> + Send;
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = WardenResult<Package>> + Send;
    fn name_taken(
        &self,
        name: &str,
        except: Option<Uuid>,
    ) -> impl Future<Output = WardenResult<bool>> + Send;
    fn slug_taken(&self, slug: &str) -> impl Future<Output = WardenResult<bool>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: BundleChanges,
    ) -> impl Future<Output = WardenResult<Package>> + Send;
    /// Detach permission and user edges, then remove the row.
    fn delete(&self, id: Uuid) -> impl Future<Output = WardenResult<()>> + Send;
    fn list(&self) -> impl Future<Output = WardenResult<Vec<Package>>> + Send;
    /// The subset of `ids` with no package row behind it.
    fn missing_ids(
        &self,
        ids: &BTreeSet<Uuid>,
    ) -> impl Future<Output = WardenResult<Vec<Uuid>>> + Send;

    fn permissions(&self, id: Uuid) -> impl Future<Output = WardenResult<Vec<Permission>>> + Send;
    fn users(&self, id: Uuid) -> impl Future<Output = WardenResult<Vec<User>>> + Send;
    fn attach_permissions(
        &self,
        id: Uuid,
        ids: &BTreeSet<Uuid>,
    ) -> impl Future<Output = WardenResult<()>> + Send;
    fn sync_permissions(
        &self,
        id: Uuid,
        ids: &BTreeSet<Uuid>,
    ) -> impl Future<Output = WardenResult<()>> + Send;
    fn detach_permissions(&self, id: Uuid) -> impl Future<Output = WardenResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    /// Create the user and attach its packages in one transaction.
    fn create(&self, input: NewUser) -> impl Future<Output = WardenResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = WardenResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = WardenResult<User>> + Send;
    fn email_taken(
        &self,
        email: &str,
        except: Option<Uuid>,
    ) -> impl Future<Output = WardenResult<bool>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UserChanges,
    ) -> impl Future<Output = WardenResult<User>> + Send;
    /// Detach package edges, null `created_by` on accounts this user
    /// created, then remove the row.
    fn delete(&self, id: Uuid) -> impl Future<Output = WardenResult<()>> + Send;
    /// Newest first, with the creator's name.
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = WardenResult<PaginatedResult<UserSummary>>> + Send;

    fn packages(&self, id: Uuid) -> impl Future<Output = WardenResult<Vec<Package>>> + Send;
    fn sync_packages(
        &self,
        id: Uuid,
        ids: &BTreeSet<Uuid>,
    ) -> impl Future<Output = WardenResult<()>> + Send;
    fn detach_packages(&self, id: Uuid) -> impl Future<Output = WardenResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Resolution reads
// ---------------------------------------------------------------------------

pub trait AccessRepository: Send + Sync {
    /// Read the user's role slug and every permission slug reachable from
    /// the role and the held packages in one consistent snapshot. Edges
    /// pointing at rows that no longer exist are skipped.
    fn load_grants(&self, user_id: Uuid) -> impl Future<Output = WardenResult<UserGrants>> + Send;
    /// Every slug in the catalogue.
    fn catalogue(&self) -> impl Future<Output = WardenResult<Vec<String>>> + Send;
    fn catalogue_contains(&self, slug: &str) -> impl Future<Output = WardenResult<bool>> + Send;
}

// ---------------------------------------------------------------------------
// Identity (supplied by the authentication layer)
// ---------------------------------------------------------------------------

pub trait IdentitySource: Send + Sync {
    /// The authenticated user of the current request, if any.
    fn current_identity(&self) -> impl Future<Output = WardenResult<Option<User>>> + Send;
}
