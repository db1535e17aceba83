//! The fixed permission catalogue and the built-in roles and starter
//! packages created by the seed process.

use crate::models::role::SUPER_ADMIN_SLUG;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionDef {
    pub slug: &'static str,
    pub name: &'static str,
    pub group: &'static str,
}

/// Which catalogue entries a seeded role or package is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    All,
    Only(&'static [&'static str]),
}

impl Grant {
    pub fn slugs(&self) -> Vec<&'static str> {
        match self {
            Grant::All => PERMISSIONS.iter().map(|p| p.slug).collect(),
            Grant::Only(slugs) => slugs.to_vec(),
        }
    }
}

/// A seeded role or package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleDef {
    pub name: &'static str,
    pub slug: &'static str,
    pub description: &'static str,
    pub grant: Grant,
}

const fn perm(slug: &'static str, name: &'static str, group: &'static str) -> PermissionDef {
    PermissionDef { slug, name, group }
}

pub const PERMISSIONS: &[PermissionDef] = &[
    perm("view-dashboard", "View Dashboard", "dashboard"),
    perm("view-users", "View Users", "users"),
    perm("create-users", "Create Users", "users"),
    perm("edit-users", "Edit Users", "users"),
    perm("delete-users", "Delete Users", "users"),
    perm("view-roles", "View Roles", "roles"),
    perm("manage-roles", "Manage Roles", "roles"),
    perm("view-packages", "View Packages", "packages"),
    perm("manage-packages", "Manage Packages", "packages"),
    perm("view-inspections", "View Inspections", "inspections"),
    perm("create-inspections", "Create Inspections", "inspections"),
    perm("edit-inspections", "Edit Inspections", "inspections"),
    perm("view-certificates", "View Certificates", "certificates"),
    perm("create-certificates", "Create Certificates", "certificates"),
    perm("edit-certificates", "Edit Certificates", "certificates"),
    perm("view-clients", "View Clients", "clients"),
    perm("create-clients", "Create Clients", "clients"),
    perm("edit-clients", "Edit Clients", "clients"),
    perm("view-fleet", "View Fleet", "fleet"),
    perm("create-fleet", "Create Fleet", "fleet"),
    perm("edit-fleet", "Edit Fleet", "fleet"),
    perm("view-analytics", "View Analytics", "analytics"),
    perm("view-profile", "View Profile", "profile"),
    perm("edit-profile", "Edit Profile", "profile"),
    perm("view-settings", "View Settings", "settings"),
    perm("edit-settings", "Edit Settings", "settings"),
];

pub const ROLES: &[BundleDef] = &[
    BundleDef {
        name: "Super Admin",
        slug: SUPER_ADMIN_SLUG,
        description: "Full system access with all permissions",
        grant: Grant::All,
    },
    BundleDef {
        name: "Admin",
        slug: "admin",
        description: "Administrative access with most permissions",
        grant: Grant::Only(&[
            "view-dashboard",
            "view-users",
            "create-users",
            "edit-users",
            "view-roles",
            "view-packages",
            "view-inspections",
            "create-inspections",
            "edit-inspections",
            "view-certificates",
            "create-certificates",
            "edit-certificates",
            "view-clients",
            "create-clients",
            "edit-clients",
            "view-fleet",
            "create-fleet",
            "edit-fleet",
            "view-analytics",
            "view-profile",
            "edit-profile",
            "view-settings",
        ]),
    },
    BundleDef {
        name: "Assistance Staff",
        slug: "assistance-staff",
        description: "Limited access for assistance staff",
        grant: Grant::Only(&[
            "view-dashboard",
            "view-inspections",
            "view-certificates",
            "view-clients",
            "view-profile",
            "edit-profile",
        ]),
    },
];

pub const PACKAGES: &[BundleDef] = &[
    BundleDef {
        name: "Basic Package",
        slug: "basic-package",
        description: "Basic access package with 3 tabs",
        grant: Grant::Only(&[
            "view-dashboard",
            "view-inspections",
            "view-profile",
            "edit-profile",
        ]),
    },
    BundleDef {
        name: "Standard Package",
        slug: "standard-package",
        description: "Standard access package with 5 tabs",
        grant: Grant::Only(&[
            "view-dashboard",
            "view-inspections",
            "view-certificates",
            "view-clients",
            "view-profile",
            "edit-profile",
        ]),
    },
    BundleDef {
        name: "Premium Package",
        slug: "premium-package",
        description: "Premium access package with all tabs",
        grant: Grant::Only(&[
            "view-dashboard",
            "view-inspections",
            "view-certificates",
            "view-clients",
            "view-fleet",
            "view-analytics",
            "view-profile",
            "edit-profile",
        ]),
    },
];
