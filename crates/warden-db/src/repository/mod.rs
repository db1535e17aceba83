//! SurrealDB repository implementations.

mod access;
mod edges;
mod package;
mod permission;
mod role;
mod user;

pub use access::SurrealAccessRepository;
pub use package::SurrealPackageRepository;
pub use permission::SurrealPermissionRepository;
pub use role::SurrealRoleRepository;
pub use user::{SurrealUserRepository, verify_password};
