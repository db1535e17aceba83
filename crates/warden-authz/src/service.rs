//! Administrative service: user, role and package management behind the
//! authorization gate.
//!
//! Every mutating operation runs in the same order: gate, validation,
//! one transactional write, cache invalidation. The cache is bypassed from
//! before the write until the invalidation is done. A denied or rejected
//! request never reaches the store.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use warden_core::error::{ValidationErrors, WardenError, WardenResult};
use warden_core::models::package::{
    CreatePackage, Package, PackageWithPermissions, UpdatePackage,
};
use warden_core::models::permission::Permission;
use warden_core::models::role::{CreateRole, Role, RoleWithPermissions, UpdateRole};
use warden_core::models::user::{CreateUser, UpdateUser, User, UserSummary};
use warden_core::repository::{
    AccessRepository, BundleChanges, NewBundle, NewUser, PackageRepository, PaginatedResult,
    Pagination, PermissionRepository, RoleRepository, UserChanges, UserRepository,
};

use crate::config::AuthzConfig;
use crate::gate::Gate;
use crate::resolver::{PermissionSet, Resolver, is_reserved};
use crate::validation::{
    check_email, check_known_ids, check_name, check_password, derive_slug, id_set,
};

/// Permission slugs required by the administrative operations.
pub mod required {
    pub const VIEW_USERS: &str = "view-users";
    pub const CREATE_USERS: &str = "create-users";
    pub const EDIT_USERS: &str = "edit-users";
    pub const DELETE_USERS: &str = "delete-users";
    pub const MANAGE_ROLES: &str = "manage-roles";
    pub const MANAGE_PACKAGES: &str = "manage-packages";
}

/// Roles and packages with their permissions, plus the whole catalogue.
#[derive(Debug, Clone, Serialize)]
pub struct AccessOverview {
    pub roles: Vec<RoleWithPermissions>,
    pub packages: Vec<PackageWithPermissions>,
    pub permissions: Vec<Permission>,
}

/// Administrative service.
///
/// Generic over repository implementations so that the authorization layer
/// has no dependency on the database crate.
pub struct AdminService<U, R, P, Q, A>
where
    U: UserRepository,
    R: RoleRepository,
    P: PackageRepository,
    Q: PermissionRepository,
    A: AccessRepository,
{
    users: U,
    roles: R,
    packages: P,
    permissions: Q,
    resolver: Resolver<A>,
    config: AuthzConfig,
}

impl<U, R, P, Q, A> AdminService<U, R, P, Q, A>
where
    U: UserRepository,
    R: RoleRepository,
    P: PackageRepository,
    Q: PermissionRepository,
    A: AccessRepository,
{
    pub fn new(
        users: U,
        roles: R,
        packages: P,
        permissions: Q,
        resolver: Resolver<A>,
        config: AuthzConfig,
    ) -> Self {
        Self {
            users,
            roles,
            packages,
            permissions,
            resolver,
            config,
        }
    }

    pub fn resolver(&self) -> &Resolver<A> {
        &self.resolver
    }

    fn gate(&self) -> Gate<'_, A> {
        Gate::new(&self.resolver)
    }

    // -------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------

    pub async fn create_user(&self, identity: Option<&User>, input: CreateUser) -> WardenResult<User> {
        let actor = self.gate().require(identity, required::CREATE_USERS).await?;

        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &input.name, self.config.max_name_length);
        check_email(&mut errors, &input.email);
        if !errors.has("email") && self.users.email_taken(&input.email, None).await? {
            errors.add("email", "has already been taken");
        }
        check_password(&mut errors, &input.password, self.config.min_password_length);
        self.check_role(&mut errors, input.role_id).await?;
        let package_ids = id_set(&input.package_ids);
        check_known_ids(
            &mut errors,
            "package_ids",
            &self.packages.missing_ids(&package_ids).await?,
        );
        errors.into_result()?;

        let write = self.resolver.begin_write();
        let result = self
            .users
            .create(NewUser {
                name: input.name,
                email: input.email,
                password: input.password,
                role_id: input.role_id,
                package_ids,
                created_by: Some(actor.id),
            })
            .await;
        if let Ok(user) = &result {
            self.resolver.invalidate_user(user.id);
        }
        drop(write);
        let user = result?;

        info!(user_id = %user.id, actor = %actor.id, "User created");
        Ok(user)
    }

    pub async fn update_user(
        &self,
        identity: Option<&User>,
        id: Uuid,
        input: UpdateUser,
    ) -> WardenResult<User> {
        let actor = self.gate().require(identity, required::EDIT_USERS).await?;
        self.users.get_by_id(id).await?;

        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &input.name, self.config.max_name_length);
        check_email(&mut errors, &input.email);
        if !errors.has("email") && self.users.email_taken(&input.email, Some(id)).await? {
            errors.add("email", "has already been taken");
        }
        if let Some(password) = &input.password {
            check_password(&mut errors, password, self.config.min_password_length);
        }
        self.check_role(&mut errors, input.role_id).await?;
        let requested = id_set(input.package_ids.requested_ids());
        check_known_ids(
            &mut errors,
            "package_ids",
            &self.packages.missing_ids(&requested).await?,
        );
        errors.into_result()?;

        let write = self.resolver.begin_write();
        let result = self
            .users
            .update(
                id,
                UserChanges {
                    name: input.name,
                    email: input.email,
                    password: input.password,
                    role_id: input.role_id,
                    packages: input.package_ids.into_change(),
                },
            )
            .await;
        self.resolver.invalidate_user(id);
        drop(write);
        let user = result?;

        info!(user_id = %id, actor = %actor.id, "User updated");
        Ok(user)
    }

    pub async fn delete_user(&self, identity: Option<&User>, id: Uuid) -> WardenResult<()> {
        let actor = self.gate().require(identity, required::DELETE_USERS).await?;
        self.users.get_by_id(id).await?;

        let write = self.resolver.begin_write();
        let result = self.users.delete(id).await;
        self.resolver.invalidate_user(id);
        drop(write);
        result?;

        info!(user_id = %id, actor = %actor.id, "User deleted");
        Ok(())
    }

    /// Newest first, with each creator's name.
    pub async fn list_users(
        &self,
        identity: Option<&User>,
        pagination: Pagination,
    ) -> WardenResult<PaginatedResult<UserSummary>> {
        self.gate().require(identity, required::VIEW_USERS).await?;
        self.users.list(pagination).await
    }

    // -------------------------------------------------------------------
    // Roles
    // -------------------------------------------------------------------

    pub async fn create_role(
        &self,
        identity: Option<&User>,
        input: CreateRole,
    ) -> WardenResult<RoleWithPermissions> {
        let actor = self.gate().require(identity, required::MANAGE_ROLES).await?;

        let slug = derive_slug(input.slug.as_deref(), &input.name);
        let permission_ids = id_set(&input.permission_ids);

        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &input.name, self.config.max_name_length);
        if errors.is_empty() && self.roles.name_taken(&input.name, None).await? {
            errors.add("name", "has already been taken");
        }
        if slug.is_empty() {
            errors.add("slug", "must contain at least one letter or digit");
        } else if self.roles.slug_taken(&slug).await? {
            errors.add("slug", "has already been taken");
        }
        self.check_permissions(&mut errors, &permission_ids).await?;
        errors.into_result()?;

        let write = self.resolver.begin_write();
        let result = self
            .roles
            .create(NewBundle {
                name: input.name,
                slug,
                description: input.description,
                permission_ids,
            })
            .await;
        self.resolver.invalidate_all();
        drop(write);
        let role = result?;

        info!(role_id = %role.id, slug = %role.slug, actor = %actor.id, "Role created");
        self.role_with_permissions(role).await
    }

    pub async fn update_role(
        &self,
        identity: Option<&User>,
        id: Uuid,
        input: UpdateRole,
    ) -> WardenResult<RoleWithPermissions> {
        let actor = self.gate().require(identity, required::MANAGE_ROLES).await?;
        self.roles.get_by_id(id).await?;

        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &input.name, self.config.max_name_length);
        if errors.is_empty() && self.roles.name_taken(&input.name, Some(id)).await? {
            errors.add("name", "has already been taken");
        }
        self.check_permissions(&mut errors, &id_set(input.permission_ids.requested_ids()))
            .await?;
        errors.into_result()?;

        let write = self.resolver.begin_write();
        let result = self
            .roles
            .update(
                id,
                BundleChanges {
                    name: input.name,
                    description: input.description,
                    permissions: input.permission_ids.into_change(),
                },
            )
            .await;
        self.resolver.invalidate_all();
        drop(write);
        let role = result?;

        info!(role_id = %id, actor = %actor.id, "Role updated");
        self.role_with_permissions(role).await
    }

    pub async fn delete_role(&self, identity: Option<&User>, id: Uuid) -> WardenResult<()> {
        let actor = self.gate().require(identity, required::MANAGE_ROLES).await?;
        let role = self.roles.get_by_id(id).await?;
        if is_reserved(&role) {
            let mut errors = ValidationErrors::new();
            errors.add("role", "the super-admin role cannot be deleted");
            errors.into_result()?;
        }

        let write = self.resolver.begin_write();
        let result = self.roles.delete(id).await;
        self.resolver.invalidate_all();
        drop(write);
        result?;

        info!(role_id = %id, actor = %actor.id, "Role deleted");
        Ok(())
    }

    // -------------------------------------------------------------------
    // Packages
    // -------------------------------------------------------------------

    pub async fn create_package(
        &self,
        identity: Option<&User>,
        input: CreatePackage,
    ) -> WardenResult<PackageWithPermissions> {
        let actor = self.gate().require(identity, required::MANAGE_PACKAGES).await?;

        let slug = derive_slug(input.slug.as_deref(), &input.name);
        let permission_ids = id_set(&input.permission_ids);

        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &input.name, self.config.max_name_length);
        if errors.is_empty() && self.packages.name_taken(&input.name, None).await? {
            errors.add("name", "has already been taken");
        }
        if slug.is_empty() {
            errors.add("slug", "must contain at least one letter or digit");
        } else if self.packages.slug_taken(&slug).await? {
            errors.add("slug", "has already been taken");
        }
        self.check_permissions(&mut errors, &permission_ids).await?;
        errors.into_result()?;

        let write = self.resolver.begin_write();
        let result = self
            .packages
            .create(NewBundle {
                name: input.name,
                slug,
                description: input.description,
                permission_ids,
            })
            .await;
        self.resolver.invalidate_all();
        drop(write);
        let package = result?;

        info!(package_id = %package.id, slug = %package.slug, actor = %actor.id, "Package created");
        self.package_with_permissions(package).await
    }

    pub async fn update_package(
        &self,
        identity: Option<&User>,
        id: Uuid,
        input: UpdatePackage,
    ) -> WardenResult<PackageWithPermissions> {
        let actor = self.gate().require(identity, required::MANAGE_PACKAGES).await?;
        self.packages.get_by_id(id).await?;

        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &input.name, self.config.max_name_length);
        if errors.is_empty() && self.packages.name_taken(&input.name, Some(id)).await? {
            errors.add("name", "has already been taken");
        }
        self.check_permissions(&mut errors, &id_set(input.permission_ids.requested_ids()))
            .await?;
        errors.into_result()?;

        let write = self.resolver.begin_write();
        let result = self
            .packages
            .update(
                id,
                BundleChanges {
                    name: input.name,
                    description: input.description,
                    permissions: input.permission_ids.into_change(),
                },
            )
            .await;
        self.resolver.invalidate_all();
        drop(write);
        let package = result?;

        info!(package_id = %id, actor = %actor.id, "Package updated");
        self.package_with_permissions(package).await
    }

    pub async fn delete_package(&self, identity: Option<&User>, id: Uuid) -> WardenResult<()> {
        let actor = self.gate().require(identity, required::MANAGE_PACKAGES).await?;
        self.packages.get_by_id(id).await?;

        let write = self.resolver.begin_write();
        let result = self.packages.delete(id).await;
        self.resolver.invalidate_all();
        drop(write);
        result?;

        info!(package_id = %id, actor = %actor.id, "Package deleted");
        Ok(())
    }

    // -------------------------------------------------------------------
    // Reads for any authenticated identity
    // -------------------------------------------------------------------

    /// Every role and package with its permissions, and the catalogue
    /// ordered by group, then name.
    pub async fn access_overview(&self, identity: Option<&User>) -> WardenResult<AccessOverview> {
        authenticated(identity)?;

        let mut roles = Vec::new();
        for role in self.roles.list().await? {
            roles.push(self.role_with_permissions(role).await?);
        }
        let mut packages = Vec::new();
        for package in self.packages.list().await? {
            packages.push(self.package_with_permissions(package).await?);
        }

        Ok(AccessOverview {
            roles,
            packages,
            permissions: self.permissions.list().await?,
        })
    }

    /// The caller's own resolved permissions.
    pub async fn current_permissions(&self, identity: Option<&User>) -> WardenResult<PermissionSet> {
        let user = authenticated(identity)?;
        self.resolver.resolve(user.id).await
    }

    // -------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------

    async fn check_role(&self, errors: &mut ValidationErrors, role_id: Option<Uuid>) -> WardenResult<()> {
        let Some(role_id) = role_id else {
            return Ok(());
        };
        match self.roles.get_by_id(role_id).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                errors.add("role_id", format!("unknown id {role_id}"));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn check_permissions(
        &self,
        errors: &mut ValidationErrors,
        ids: &BTreeSet<Uuid>,
    ) -> WardenResult<()> {
        let missing = self.permissions.missing_ids(ids).await?;
        check_known_ids(errors, "permission_ids", &missing);
        Ok(())
    }

    async fn role_with_permissions(&self, role: Role) -> WardenResult<RoleWithPermissions> {
        let permissions = self.roles.permissions(role.id).await?;
        Ok(RoleWithPermissions { role, permissions })
    }

    async fn package_with_permissions(&self, package: Package) -> WardenResult<PackageWithPermissions> {
        let permissions = self.packages.permissions(package.id).await?;
        Ok(PackageWithPermissions {
            package,
            permissions,
        })
    }
}

/// The identity-only requirement of the read operations.
fn authenticated(identity: Option<&User>) -> WardenResult<&User> {
    identity.ok_or_else(|| WardenError::Forbidden {
        permission: "authenticated".into(),
    })
}
