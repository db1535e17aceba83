//! AdminService tests: gate first, validation before writes, edge-update
//! policy and cache invalidation.

use std::collections::BTreeSet;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;
use warden_authz::{AdminService, AuthzConfig, Resolver};
use warden_core::edge::EdgeUpdate;
use warden_core::error::WardenError;
use warden_core::models::package::{CreatePackage, UpdatePackage};
use warden_core::models::role::{CreateRole, UpdateRole};
use warden_core::models::user::{CreateUser, UpdateUser, User};
use warden_core::repository::{
    PackageRepository, Pagination, PermissionRepository, RoleRepository, UserRepository,
};
use warden_db::repository::{
    SurrealAccessRepository, SurrealPackageRepository, SurrealPermissionRepository,
    SurrealRoleRepository, SurrealUserRepository,
};
use warden_db::{SeedAccount, Seeder};

type Service = AdminService<
    SurrealUserRepository<Db>,
    SurrealRoleRepository<Db>,
    SurrealPackageRepository<Db>,
    SurrealPermissionRepository<Db>,
    SurrealAccessRepository<Db>,
>;

struct Fixture {
    db: Surreal<Db>,
    service: Service,
    root: User,
}

async fn fixture() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    warden_db::run_migrations(&db).await.unwrap();
    Seeder::new(db.clone(), None)
        .run(&SeedAccount::default())
        .await
        .unwrap();

    let config = AuthzConfig::default();
    let service = AdminService::new(
        SurrealUserRepository::new(db.clone()),
        SurrealRoleRepository::new(db.clone()),
        SurrealPackageRepository::new(db.clone()),
        SurrealPermissionRepository::new(db.clone()),
        Resolver::new(SurrealAccessRepository::new(db.clone()), &config),
        config,
    );
    let root = SurrealUserRepository::new(db.clone())
        .get_by_email("superadmin@gmail.com")
        .await
        .unwrap();
    Fixture { db, service, root }
}

impl Fixture {
    async fn permission_ids(&self, slugs: &[&str]) -> Vec<Uuid> {
        let repo = SurrealPermissionRepository::new(self.db.clone());
        let mut ids = Vec::new();
        for slug in slugs {
            ids.push(repo.get_by_slug(slug).await.unwrap().id);
        }
        ids
    }

    async fn role_id(&self, slug: &str) -> Uuid {
        SurrealRoleRepository::new(self.db.clone())
            .get_by_slug(slug)
            .await
            .unwrap()
            .id
    }

    async fn package_id(&self, slug: &str) -> Uuid {
        SurrealPackageRepository::new(self.db.clone())
            .get_by_slug(slug)
            .await
            .unwrap()
            .id
    }

    async fn user_with_role(&self, email: &str, role_slug: &str) -> User {
        let role_id = self.role_id(role_slug).await;
        self.service
            .create_user(
                Some(&self.root),
                CreateUser {
                    name: email.into(),
                    email: email.into(),
                    password: "secret1".into(),
                    role_id: Some(role_id),
                    package_ids: Vec::new(),
                },
            )
            .await
            .unwrap()
    }
}

fn assert_validation(err: WardenError, field: &str) {
    match err {
        WardenError::Validation { errors } => {
            assert!(errors.has(field), "expected error on {field}, got {errors}")
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn create_user_records_creator_and_packages() {
    let f = fixture().await;
    let basic = f.package_id("basic-package").await;

    let user = f
        .service
        .create_user(
            Some(&f.root),
            CreateUser {
                name: "Alice".into(),
                email: "alice@example.com".into(),
                password: "secret1".into(),
                role_id: None,
                package_ids: vec![basic, basic],
            },
        )
        .await
        .unwrap();

    assert_eq!(user.created_by, Some(f.root.id));
    let permissions = f.service.current_permissions(Some(&user)).await.unwrap();
    assert!(permissions.contains("view-inspections"));
    assert!(!permissions.contains("view-users"));
}

#[tokio::test]
async fn create_user_reports_every_invalid_field() {
    let f = fixture().await;

    let err = f
        .service
        .create_user(
            Some(&f.root),
            CreateUser {
                name: String::new(),
                email: "superadmin@gmail.com".into(),
                password: "123".into(),
                role_id: Some(Uuid::new_v4()),
                package_ids: vec![Uuid::new_v4()],
            },
        )
        .await
        .unwrap_err();

    let WardenError::Validation { errors } = err else {
        panic!("expected validation error");
    };
    for field in ["name", "email", "password", "role_id", "package_ids"] {
        assert!(errors.has(field), "missing error on {field}");
    }

    let page = SurrealUserRepository::new(f.db.clone())
        .list(Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let f = fixture().await;
    let err = f
        .service
        .create_user(
            Some(&f.root),
            CreateUser {
                name: "Other".into(),
                email: "superadmin@gmail.com".into(),
                password: "secret1".into(),
                ..CreateUser::default()
            },
        )
        .await
        .unwrap_err();
    assert_validation(err, "email");
}

#[tokio::test]
async fn forbidden_operations_leave_stores_untouched() {
    let f = fixture().await;
    let staff = f.user_with_role("staff@example.com", "assistance-staff").await;

    let err = f
        .service
        .create_role(
            Some(&staff),
            CreateRole {
                name: "Shadow".into(),
                ..CreateRole::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    // The gate runs before the target lookup.
    let err = f
        .service
        .delete_user(Some(&staff), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    let err = f.service.delete_user(None, f.root.id).await.unwrap_err();
    assert!(err.is_forbidden());

    let roles = SurrealRoleRepository::new(f.db.clone());
    assert!(roles.get_by_slug("shadow").await.unwrap_err().is_not_found());
    assert!(
        SurrealUserRepository::new(f.db.clone())
            .get_by_id(f.root.id)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn admin_cannot_delete_users() {
    let f = fixture().await;
    let admin = f.user_with_role("admin@example.com", "admin").await;
    let staff = f.user_with_role("staff@example.com", "assistance-staff").await;

    let err = f
        .service
        .delete_user(Some(&admin), staff.id)
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::Forbidden { ref permission } if permission == "delete-users"));

    f.service.delete_user(Some(&f.root), staff.id).await.unwrap();
}

#[tokio::test]
async fn duplicate_role_name_fails_without_side_effects() {
    let f = fixture().await;
    let ids = f.permission_ids(&["view-fleet"]).await;

    let err = f
        .service
        .create_role(
            Some(&f.root),
            CreateRole {
                name: "Admin".into(),
                slug: Some("admin-two".into()),
                description: None,
                permission_ids: ids,
            },
        )
        .await
        .unwrap_err();
    assert_validation(err, "name");

    let roles = SurrealRoleRepository::new(f.db.clone());
    assert_eq!(roles.list().await.unwrap().len(), 3);
    let admin = roles.get_by_slug("admin").await.unwrap();
    let slugs: BTreeSet<String> = roles
        .permissions(admin.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.slug)
        .collect();
    assert!(!slugs.contains("view-fleet"));
}

#[tokio::test]
async fn create_role_derives_slug_and_rejects_unknown_permissions() {
    let f = fixture().await;

    let created = f
        .service
        .create_role(
            Some(&f.root),
            CreateRole {
                name: "Field Inspector".into(),
                slug: None,
                description: Some("Inspections only".into()),
                permission_ids: f.permission_ids(&["view-inspections"]).await,
            },
        )
        .await
        .unwrap();
    assert_eq!(created.role.slug, "field-inspector");
    assert_eq!(created.permissions.len(), 1);

    let err = f
        .service
        .create_role(
            Some(&f.root),
            CreateRole {
                name: "Ghost".into(),
                permission_ids: vec![Uuid::new_v4()],
                ..CreateRole::default()
            },
        )
        .await
        .unwrap_err();
    assert_validation(err, "permission_ids");
}

#[tokio::test]
async fn omitted_permission_ids_detach_all() {
    let f = fixture().await;
    let created = f
        .service
        .create_role(
            Some(&f.root),
            CreateRole {
                name: "Temp".into(),
                permission_ids: f.permission_ids(&["view-users", "view-fleet"]).await,
                ..CreateRole::default()
            },
        )
        .await
        .unwrap();

    let updated = f
        .service
        .update_role(
            Some(&f.root),
            created.role.id,
            UpdateRole {
                name: "Temp".into(),
                description: None,
                permission_ids: EdgeUpdate::Omitted,
            },
        )
        .await
        .unwrap();
    assert!(updated.permissions.is_empty());
    assert_eq!(updated.role.slug, "temp");
}

#[tokio::test]
async fn role_edit_invalidates_cached_resolution() {
    let f = fixture().await;
    let staff = f.user_with_role("staff@example.com", "assistance-staff").await;

    // Warm the cache.
    assert!(!f.service.resolver().check(staff.id, "view-fleet").await.unwrap());

    let role_id = f.role_id("assistance-staff").await;
    let ids = f.permission_ids(&["view-dashboard", "view-fleet"]).await;
    f.service
        .update_role(
            Some(&f.root),
            role_id,
            UpdateRole {
                name: "Assistance Staff".into(),
                description: None,
                permission_ids: EdgeUpdate::from_ids(ids),
            },
        )
        .await
        .unwrap();

    let permissions = f.service.current_permissions(Some(&staff)).await.unwrap();
    assert_eq!(
        permissions,
        BTreeSet::from(["view-dashboard".to_string(), "view-fleet".to_string()])
    );
}

#[tokio::test]
async fn user_edit_with_omitted_fields_clears_role_and_packages() {
    let f = fixture().await;
    let staff = f.user_with_role("staff@example.com", "assistance-staff").await;
    let premium = f.package_id("premium-package").await;

    let updated = f
        .service
        .update_user(
            Some(&f.root),
            staff.id,
            UpdateUser {
                name: "Staff".into(),
                email: "staff@example.com".into(),
                password: None,
                role_id: Some(f.role_id("assistance-staff").await),
                package_ids: EdgeUpdate::from_ids([premium]),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.password_hash, staff.password_hash);
    assert!(
        f.service
            .current_permissions(Some(&updated))
            .await
            .unwrap()
            .contains("view-analytics")
    );

    let cleared = f
        .service
        .update_user(
            Some(&f.root),
            staff.id,
            UpdateUser {
                name: "Staff".into(),
                email: "staff@example.com".into(),
                ..UpdateUser::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.role_id, None);
    assert!(
        f.service
            .current_permissions(Some(&cleared))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn package_delete_drops_its_permissions_from_holders() {
    let f = fixture().await;
    let created = f
        .service
        .create_package(
            Some(&f.root),
            CreatePackage {
                name: "Reports".into(),
                permission_ids: f
                    .permission_ids(&["view-analytics", "view-fleet", "view-clients"])
                    .await,
                ..CreatePackage::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(created.package.slug, "reports");

    let mut holders = Vec::new();
    for email in ["a@example.com", "b@example.com"] {
        holders.push(
            f.service
                .create_user(
                    Some(&f.root),
                    CreateUser {
                        name: email.into(),
                        email: email.into(),
                        password: "secret1".into(),
                        role_id: None,
                        package_ids: vec![created.package.id],
                    },
                )
                .await
                .unwrap(),
        );
    }
    assert!(
        f.service
            .current_permissions(Some(&holders[0]))
            .await
            .unwrap()
            .contains("view-fleet")
    );

    f.service
        .delete_package(Some(&f.root), created.package.id)
        .await
        .unwrap();

    for holder in &holders {
        assert!(
            f.service
                .current_permissions(Some(holder))
                .await
                .unwrap()
                .is_empty()
        );
    }
}

#[tokio::test]
async fn update_package_renames_and_syncs() {
    let f = fixture().await;
    let basic = f.package_id("basic-package").await;
    let ids = f.permission_ids(&["view-dashboard"]).await;

    let updated = f
        .service
        .update_package(
            Some(&f.root),
            basic,
            UpdatePackage {
                name: "Starter Package".into(),
                description: Some("Dashboard only".into()),
                permission_ids: EdgeUpdate::from_ids(ids.clone()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.package.name, "Starter Package");
    assert_eq!(updated.package.slug, "basic-package");
    assert_eq!(updated.permissions.len(), 1);

    // Same request again is a no-op.
    let again = f
        .service
        .update_package(
            Some(&f.root),
            basic,
            UpdatePackage {
                name: "Starter Package".into(),
                description: Some("Dashboard only".into()),
                permission_ids: EdgeUpdate::from_ids(ids),
            },
        )
        .await
        .unwrap();
    assert_eq!(again.permissions, updated.permissions);
}

#[tokio::test]
async fn deleting_a_role_clears_users_role() {
    let f = fixture().await;
    let admin = f.user_with_role("admin@example.com", "admin").await;
    assert!(f.service.resolver().check(admin.id, "view-users").await.unwrap());

    let role_id = f.role_id("admin").await;
    f.service.delete_role(Some(&f.root), role_id).await.unwrap();

    let reloaded = SurrealUserRepository::new(f.db.clone())
        .get_by_id(admin.id)
        .await
        .unwrap();
    assert_eq!(reloaded.role_id, None);
    assert!(!f.service.resolver().check(admin.id, "view-users").await.unwrap());
}

#[tokio::test]
async fn reads_require_an_identity() {
    let f = fixture().await;

    let overview = f.service.access_overview(Some(&f.root)).await.unwrap();
    assert_eq!(overview.roles.len(), 3);
    assert_eq!(overview.packages.len(), 3);
    assert_eq!(
        overview.permissions.len(),
        warden_core::catalogue::PERMISSIONS.len()
    );
    let groups: Vec<&str> = overview.permissions.iter().map(|p| p.group.as_str()).collect();
    let mut sorted = groups.clone();
    sorted.sort();
    assert_eq!(groups, sorted);

    assert!(f.service.access_overview(None).await.unwrap_err().is_forbidden());
    assert!(f.service.current_permissions(None).await.unwrap_err().is_forbidden());

    let page = f
        .service
        .list_users(Some(&f.root), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn super_admin_role_cannot_be_deleted() {
    let f = fixture().await;
    let role_id = f.role_id("super-admin").await;

    let err = f.service.delete_role(Some(&f.root), role_id).await.unwrap_err();
    assert_validation(err, "role");

    let root = SurrealUserRepository::new(f.db.clone())
        .get_by_id(f.root.id)
        .await
        .unwrap();
    assert_eq!(root.role_id, Some(role_id));
    assert!(f.service.resolver().check(root.id, "manage-roles").await.unwrap());
}

#[tokio::test]
async fn update_user_reports_invalid_name_and_taken_email_together() {
    let f = fixture().await;
    let staff = f.user_with_role("staff@example.com", "assistance-staff").await;

    let err = f
        .service
        .update_user(
            Some(&f.root),
            staff.id,
            UpdateUser {
                name: String::new(),
                email: "superadmin@gmail.com".into(),
                ..UpdateUser::default()
            },
        )
        .await
        .unwrap_err();

    let WardenError::Validation { errors } = err else {
        panic!("expected validation error");
    };
    assert!(errors.has("name"));
    assert!(errors.has("email"));
}

#[tokio::test]
async fn writes_leave_no_cache_bypass_behind() {
    let f = fixture().await;
    let admin = f.user_with_role("admin@example.com", "admin").await;
    let cache = f.service.resolver().cache().unwrap();

    assert!(f.service.resolver().check(admin.id, "view-users").await.unwrap());
    assert!(cache.get(admin.id).is_some());

    let role_id = f.role_id("admin").await;
    f.service
        .update_role(
            Some(&f.root),
            role_id,
            UpdateRole {
                name: "Admin".into(),
                description: None,
                permission_ids: EdgeUpdate::Cleared,
            },
        )
        .await
        .unwrap();

    assert_eq!(cache.writes_in_flight(), 0);
    assert!(cache.get(admin.id).is_none());
    assert!(!f.service.resolver().check(admin.id, "view-users").await.unwrap());
}
