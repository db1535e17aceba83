//! Idempotent seeding of the permission catalogue, the built-in roles, the
//! starter packages and the default super-admin account.
//!
//! Every entity is looked up by its natural key (slug or email) and only
//! created when absent. The default account is the exception: it is updated
//! in place so its role and password always match the seed settings.

use std::collections::{BTreeSet, HashMap};

use surrealdb::{Connection, Surreal};
use tracing::{debug, info};
use uuid::Uuid;
use warden_core::catalogue::{BundleDef, PACKAGES, PERMISSIONS, ROLES};
use warden_core::edge::EdgeChange;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::permission::CreatePermission;
use warden_core::models::role::SUPER_ADMIN_SLUG;
use warden_core::models::user::User;
use warden_core::repository::{
    NewBundle, NewUser, PackageRepository, PermissionRepository, RoleRepository, UserChanges,
    UserRepository,
};

use crate::repository::{
    SurrealPackageRepository, SurrealPermissionRepository, SurrealRoleRepository,
    SurrealUserRepository,
};

/// The account created (or refreshed) by the seed.
#[derive(Debug, Clone)]
pub struct SeedAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Default for SeedAccount {
    fn default() -> Self {
        Self {
            name: "Super Admin".into(),
            email: "superadmin@gmail.com".into(),
            password: "admin123".into(),
        }
    }
}

/// What a seed run actually created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub permissions_created: usize,
    pub roles_created: usize,
    pub packages_created: usize,
    pub account_created: bool,
}

pub struct Seeder<C: Connection> {
    permissions: SurrealPermissionRepository<C>,
    roles: SurrealRoleRepository<C>,
    packages: SurrealPackageRepository<C>,
    users: SurrealUserRepository<C>,
}

impl<C: Connection> Seeder<C> {
    pub fn new(db: Surreal<C>, pepper: Option<String>) -> Self {
        let users = match pepper {
            Some(pepper) => SurrealUserRepository::with_pepper(db.clone(), pepper),
            None => SurrealUserRepository::new(db.clone()),
        };
        Self {
            permissions: SurrealPermissionRepository::new(db.clone()),
            roles: SurrealRoleRepository::new(db.clone()),
            packages: SurrealPackageRepository::new(db),
            users,
        }
    }

    /// Run every seed step in dependency order.
    pub async fn run(&self, account: &SeedAccount) -> WardenResult<SeedReport> {
        let mut report = SeedReport::default();

        let ids = self.seed_permissions(&mut report).await?;
        for def in ROLES {
            self.seed_role(def, &ids, &mut report).await?;
        }
        for def in PACKAGES {
            self.seed_package(def, &ids, &mut report).await?;
        }
        self.seed_account(account, &mut report).await?;

        info!(
            permissions = report.permissions_created,
            roles = report.roles_created,
            packages = report.packages_created,
            account_created = report.account_created,
            "Seed complete"
        );
        Ok(report)
    }

    /// Ensure every catalogue entry exists; returns slug -> id.
    async fn seed_permissions(
        &self,
        report: &mut SeedReport,
    ) -> WardenResult<HashMap<&'static str, Uuid>> {
        let mut ids = HashMap::with_capacity(PERMISSIONS.len());
        for def in PERMISSIONS {
            let permission = match self.permissions.get_by_slug(def.slug).await {
                Ok(existing) => existing,
                Err(e) if e.is_not_found() => {
                    debug!(slug = def.slug, "Creating permission");
                    report.permissions_created += 1;
                    self.permissions
                        .create(CreatePermission {
                            slug: def.slug.into(),
                            name: def.name.into(),
                            group: def.group.into(),
                        })
                        .await?
                }
                Err(e) => return Err(e),
            };
            ids.insert(def.slug, permission.id);
        }
        Ok(ids)
    }

    async fn seed_role(
        &self,
        def: &BundleDef,
        ids: &HashMap<&'static str, Uuid>,
        report: &mut SeedReport,
    ) -> WardenResult<()> {
        match self.roles.get_by_slug(def.slug).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                info!(slug = def.slug, "Creating role");
                self.roles.create(new_bundle(def, ids)?).await?;
                report.roles_created += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn seed_package(
        &self,
        def: &BundleDef,
        ids: &HashMap<&'static str, Uuid>,
        report: &mut SeedReport,
    ) -> WardenResult<()> {
        match self.packages.get_by_slug(def.slug).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                info!(slug = def.slug, "Creating package");
                self.packages.create(new_bundle(def, ids)?).await?;
                report.packages_created += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn seed_account(&self, account: &SeedAccount, report: &mut SeedReport) -> WardenResult<User> {
        let role = self.roles.get_by_slug(SUPER_ADMIN_SLUG).await?;

        match self.users.get_by_email(&account.email).await {
            Ok(existing) => {
                debug!(email = %account.email, "Refreshing default account");
                let held: BTreeSet<Uuid> = self
                    .users
                    .packages(existing.id)
                    .await?
                    .into_iter()
                    .map(|p| p.id)
                    .collect();
                self.users
                    .update(
                        existing.id,
                        UserChanges {
                            name: account.name.clone(),
                            email: account.email.clone(),
                            password: Some(account.password.clone()),
                            role_id: Some(role.id),
                            packages: EdgeChange::Sync(held),
                        },
                    )
                    .await
            }
            Err(e) if e.is_not_found() => {
                info!(email = %account.email, "Creating default account");
                report.account_created = true;
                self.users
                    .create(NewUser {
                        name: account.name.clone(),
                        email: account.email.clone(),
                        password: account.password.clone(),
                        role_id: Some(role.id),
                        package_ids: BTreeSet::new(),
                        created_by: None,
                    })
                    .await
            }
            Err(e) => Err(e),
        }
    }
}

fn new_bundle(def: &BundleDef, ids: &HashMap<&'static str, Uuid>) -> WardenResult<NewBundle> {
    let permission_ids = def
        .grant
        .slugs()
        .into_iter()
        .map(|slug| {
            ids.get(slug).copied().ok_or_else(|| {
                WardenError::Internal(format!("{} grants unknown permission {slug}", def.slug))
            })
        })
        .collect::<WardenResult<BTreeSet<_>>>()?;

    Ok(NewBundle {
        name: def.name.into(),
        slug: def.slug.into(),
        description: Some(def.description.into()),
        permission_ids,
    })
}
