//! Resolver and gate behaviour against a seeded in-memory SurrealDB.

use std::collections::BTreeSet;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;
use warden_authz::{AuthzConfig, Decision, Gate, Resolution, Resolver};
use warden_core::models::permission::CreatePermission;
use warden_core::models::user::User;
use warden_core::repository::{
    NewBundle, NewUser, PackageRepository, PermissionRepository, RoleRepository, UserRepository,
};
use warden_db::repository::{
    SurrealAccessRepository, SurrealPackageRepository, SurrealPermissionRepository,
    SurrealRoleRepository, SurrealUserRepository,
};
use warden_db::{SeedAccount, Seeder};

async fn seeded() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    warden_db::run_migrations(&db).await.unwrap();
    Seeder::new(db.clone(), None)
        .run(&SeedAccount::default())
        .await
        .unwrap();
    db
}

async fn permission_ids(db: &Surreal<Db>, slugs: &[&str]) -> BTreeSet<Uuid> {
    let repo = SurrealPermissionRepository::new(db.clone());
    let mut ids = BTreeSet::new();
    for slug in slugs {
        ids.insert(repo.get_by_slug(slug).await.unwrap().id);
    }
    ids
}

async fn user(db: &Surreal<Db>, email: &str, role_id: Option<Uuid>, packages: &[Uuid]) -> User {
    SurrealUserRepository::new(db.clone())
        .create(NewUser {
            name: email.into(),
            email: email.into(),
            password: "secret1".into(),
            role_id,
            package_ids: packages.iter().copied().collect(),
            created_by: None,
        })
        .await
        .unwrap()
}

fn set(slugs: &[&str]) -> BTreeSet<String> {
    slugs.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn role_and_package_union() {
    let db = seeded().await;
    let roles = SurrealRoleRepository::new(db.clone());
    let packages = SurrealPackageRepository::new(db.clone());

    let role = roles
        .create(NewBundle {
            name: "Desk".into(),
            slug: "desk".into(),
            description: None,
            permission_ids: permission_ids(&db, &["view-users", "create-users", "edit-users"])
                .await,
        })
        .await
        .unwrap();
    let package = packages
        .create(NewBundle {
            name: "Fleet Add-on".into(),
            slug: "fleet-add-on".into(),
            description: None,
            permission_ids: permission_ids(&db, &["view-fleet", "view-analytics"]).await,
        })
        .await
        .unwrap();
    let alice = user(&db, "alice@example.com", Some(role.id), &[package.id]).await;

    let resolver = Resolver::uncached(SurrealAccessRepository::new(db.clone()));
    assert_eq!(
        resolver.resolve(alice.id).await.unwrap(),
        set(&["view-users", "create-users", "edit-users", "view-fleet", "view-analytics"])
    );
    assert!(!resolver.check(alice.id, "delete-users").await.unwrap());
    assert!(resolver.check(alice.id, "view-fleet").await.unwrap());
}

#[tokio::test]
async fn overlapping_bundles_are_deduplicated() {
    let db = seeded().await;
    let roles = SurrealRoleRepository::new(db.clone());
    let packages = SurrealPackageRepository::new(db.clone());

    let staff = roles.get_by_slug("assistance-staff").await.unwrap();
    let basic = packages.get_by_slug("basic-package").await.unwrap();
    let premium = packages.get_by_slug("premium-package").await.unwrap();
    let bob = user(&db, "bob@example.com", Some(staff.id), &[basic.id, premium.id]).await;

    let resolver = Resolver::uncached(SurrealAccessRepository::new(db.clone()));
    let resolved = resolver.resolve(bob.id).await.unwrap();
    assert_eq!(
        resolved,
        set(&[
            "view-dashboard",
            "view-inspections",
            "view-certificates",
            "view-clients",
            "view-fleet",
            "view-analytics",
            "view-profile",
            "edit-profile",
        ])
    );
}

#[tokio::test]
async fn no_role_no_packages_denies_everything() {
    let db = seeded().await;
    let nobody = user(&db, "nobody@example.com", None, &[]).await;

    let resolver = Resolver::uncached(SurrealAccessRepository::new(db.clone()));
    assert!(resolver.resolve(nobody.id).await.unwrap().is_empty());
    assert!(!resolver.check(nobody.id, "view-dashboard").await.unwrap());
}

#[tokio::test]
async fn super_admin_sees_permissions_added_later() {
    let db = seeded().await;
    let admin = SurrealUserRepository::new(db.clone())
        .get_by_email("superadmin@gmail.com")
        .await
        .unwrap();

    let resolver = Resolver::new(SurrealAccessRepository::new(db.clone()), &AuthzConfig::default());
    assert_eq!(resolver.resolution(admin.id).await.unwrap(), Resolution::Everything);
    assert!(!resolver.check(admin.id, "export-reports").await.unwrap());

    SurrealPermissionRepository::new(db.clone())
        .create(CreatePermission {
            slug: "export-reports".into(),
            name: "Export Reports".into(),
            group: "reports".into(),
        })
        .await
        .unwrap();

    // Still cached, and still sees the new slug.
    assert!(resolver.check(admin.id, "export-reports").await.unwrap());
    assert!(resolver.resolve(admin.id).await.unwrap().contains("export-reports"));
}

#[tokio::test]
async fn super_admin_ignores_its_own_edges() {
    let db = seeded().await;
    let roles = SurrealRoleRepository::new(db.clone());
    let super_admin = roles.get_by_slug("super-admin").await.unwrap();
    roles.detach_permissions(super_admin.id).await.unwrap();

    let admin = SurrealUserRepository::new(db.clone())
        .get_by_email("superadmin@gmail.com")
        .await
        .unwrap();
    let resolver = Resolver::uncached(SurrealAccessRepository::new(db.clone()));
    assert!(resolver.check(admin.id, "delete-users").await.unwrap());
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let db = seeded().await;
    let resolver = Resolver::uncached(SurrealAccessRepository::new(db));
    assert!(resolver.resolve(Uuid::new_v4()).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn gate_denies_missing_identity_and_missing_permission() {
    let db = seeded().await;
    let roles = SurrealRoleRepository::new(db.clone());
    let staff = roles.get_by_slug("assistance-staff").await.unwrap();
    let carol = user(&db, "carol@example.com", Some(staff.id), &[]).await;

    let resolver = Resolver::uncached(SurrealAccessRepository::new(db));
    let gate = Gate::new(&resolver);

    assert_eq!(gate.authorize(None, "view-dashboard").await.unwrap(), Decision::Deny);
    assert_eq!(
        gate.authorize(Some(&carol), "view-dashboard").await.unwrap(),
        Decision::Allow
    );
    assert_eq!(
        gate.authorize(Some(&carol), "delete-users").await.unwrap(),
        Decision::Deny
    );

    let err = gate.require(Some(&carol), "delete-users").await.unwrap_err();
    assert!(err.is_forbidden());
}

#[tokio::test]
async fn check_any_matches_one_of_several() {
    let db = seeded().await;
    let staff = SurrealRoleRepository::new(db.clone())
        .get_by_slug("assistance-staff")
        .await
        .unwrap();
    let bob = user(&db, "bob@example.com", Some(staff.id), &[]).await;
    let root = SurrealUserRepository::new(db.clone())
        .get_by_email("superadmin@gmail.com")
        .await
        .unwrap();

    let resolver = Resolver::new(SurrealAccessRepository::new(db.clone()), &AuthzConfig::default());
    assert!(resolver.check_any(bob.id, &["delete-users", "view-dashboard"]).await.unwrap());
    assert!(!resolver.check_any(bob.id, &["delete-users", "manage-roles"]).await.unwrap());
    assert!(!resolver.check_any(bob.id, &[]).await.unwrap());

    assert!(resolver.check_any(root.id, &["no-such-permission", "delete-users"]).await.unwrap());
    assert!(!resolver.check_any(root.id, &["no-such-permission"]).await.unwrap());
}
