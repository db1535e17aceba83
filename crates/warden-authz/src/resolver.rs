//! Permission resolution.
//!
//! A user's effective permissions are the union of the slugs granted by
//! their role and by every package they hold. A user whose role is the
//! super-admin role holds the whole catalogue instead, regardless of the
//! role's own grant edges.

use std::collections::BTreeSet;

use tracing::debug;
use uuid::Uuid;
use warden_core::error::WardenResult;
use warden_core::models::role::{Role, SUPER_ADMIN_SLUG};
use warden_core::repository::{AccessRepository, UserGrants};

use crate::cache::{ResolutionCache, WriteGuard};
use crate::config::AuthzConfig;

/// A de-duplicated set of permission slugs.
pub type PermissionSet = BTreeSet<String>;

/// What a user is allowed to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Every permission in the catalogue, including ones added later.
    Everything,
    Granted(PermissionSet),
}

impl Resolution {
    pub fn is_everything(&self) -> bool {
        matches!(self, Resolution::Everything)
    }
}

/// The one comparison against the super-admin slug.
fn is_super_admin_slug(slug: &str) -> bool {
    slug == SUPER_ADMIN_SLUG
}

/// Whether `role` is the super-admin role, which can never be deleted.
pub fn is_reserved(role: &Role) -> bool {
    is_super_admin_slug(&role.slug)
}

/// Fold a user's grants into a [`Resolution`].
pub fn resolve_grants(grants: UserGrants) -> Resolution {
    if grants.role_slug.as_deref().is_some_and(is_super_admin_slug) {
        return Resolution::Everything;
    }
    Resolution::Granted(
        grants
            .role_permissions
            .into_iter()
            .chain(grants.package_permissions)
            .collect(),
    )
}

/// Resolves and checks permissions, optionally through a
/// [`ResolutionCache`].
#[derive(Clone)]
pub struct Resolver<A: AccessRepository> {
    access: A,
    cache: Option<ResolutionCache>,
}

impl<A: AccessRepository> Resolver<A> {
    pub fn new(access: A, config: &AuthzConfig) -> Self {
        let cache = config
            .cache_enabled
            .then(|| ResolutionCache::new(config.cache_capacity));
        Self { access, cache }
    }

    /// A resolver that always reads through to the store.
    pub fn uncached(access: A) -> Self {
        Self {
            access,
            cache: None,
        }
    }

    pub fn cache(&self) -> Option<&ResolutionCache> {
        self.cache.as_ref()
    }

    /// The user's [`Resolution`], served from the cache when possible.
    pub async fn resolution(&self, user_id: Uuid) -> WardenResult<Resolution> {
        let Some(cache) = &self.cache else {
            return Ok(resolve_grants(self.access.load_grants(user_id).await?));
        };

        if let Some(hit) = cache.get(user_id) {
            return Ok(hit);
        }

        let generation = cache.generation();
        let resolution = resolve_grants(self.access.load_grants(user_id).await?);
        if !cache.insert(user_id, resolution.clone(), generation) {
            debug!(%user_id, "Resolution computed across an invalidation, not cached");
        }
        Ok(resolution)
    }

    /// The user's effective permission slugs.
    pub async fn resolve(&self, user_id: Uuid) -> WardenResult<PermissionSet> {
        match self.resolution(user_id).await? {
            Resolution::Everything => Ok(self.access.catalogue().await?.into_iter().collect()),
            Resolution::Granted(set) => Ok(set),
        }
    }

    /// Whether the user holds `slug`. The super-admin case is a single
    /// catalogue lookup.
    pub async fn check(&self, user_id: Uuid, slug: &str) -> WardenResult<bool> {
        match self.resolution(user_id).await? {
            Resolution::Everything => self.access.catalogue_contains(slug).await,
            Resolution::Granted(set) => Ok(set.contains(slug)),
        }
    }

    /// Whether the user holds at least one of `slugs`.
    pub async fn check_any(&self, user_id: Uuid, slugs: &[&str]) -> WardenResult<bool> {
        if slugs.is_empty() {
            return Ok(false);
        }
        match self.resolution(user_id).await? {
            Resolution::Everything => {
                for slug in slugs {
                    if self.access.catalogue_contains(slug).await? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Resolution::Granted(set) => Ok(slugs.iter().any(|slug| set.contains(*slug))),
        }
    }

    /// Bypass the cache until the returned guard drops. Take it before a
    /// store write and drop it after the matching invalidation.
    pub fn begin_write(&self) -> Option<WriteGuard> {
        self.cache.as_ref().map(ResolutionCache::begin_write)
    }

    /// Forget every cached resolution.
    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }

    /// Forget one user's cached resolution.
    pub fn invalidate_user(&self, user_id: Uuid) {
        if let Some(cache) = &self.cache {
            cache.invalidate_user(user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grants(role: Option<&str>, role_perms: &[&str], package_perms: &[&str]) -> UserGrants {
        UserGrants {
            user_id: Uuid::new_v4(),
            role_slug: role.map(String::from),
            role_permissions: role_perms.iter().map(|s| s.to_string()).collect(),
            package_permissions: package_perms.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn no_role_no_packages_is_empty() {
        assert_eq!(
            resolve_grants(grants(None, &[], &[])),
            Resolution::Granted(PermissionSet::new())
        );
    }

    #[test]
    fn union_is_deduplicated() {
        let resolution = resolve_grants(grants(
            Some("admin"),
            &["view-users", "view-dashboard"],
            &["view-dashboard", "view-fleet", "view-fleet"],
        ));
        let Resolution::Granted(set) = resolution else {
            panic!("expected granted set");
        };
        assert_eq!(set.len(), 3);
        assert!(set.contains("view-fleet"));
    }

    #[test]
    fn super_admin_ignores_edges() {
        let resolution = resolve_grants(grants(Some(SUPER_ADMIN_SLUG), &[], &[]));
        assert!(resolution.is_everything());
    }

    #[test]
    fn only_the_super_admin_role_is_reserved() {
        let role = |slug: &str| Role {
            id: Uuid::new_v4(),
            name: slug.into(),
            slug: slug.into(),
            description: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert!(is_reserved(&role(SUPER_ADMIN_SLUG)));
        assert!(!is_reserved(&role("admin")));
    }

    #[test]
    fn lookalike_slug_is_not_super_admin() {
        let resolution = resolve_grants(grants(Some("super-admin-2"), &["view-users"], &[]));
        assert!(!resolution.is_everything());
    }
}
