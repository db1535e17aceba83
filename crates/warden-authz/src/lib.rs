//! Warden Authz — permission resolution, the resolution cache, the
//! authorization gate and the administrative service built on them.

pub mod cache;
pub mod config;
pub mod gate;
pub mod identity;
pub mod resolver;
pub mod service;
mod validation;

pub use cache::{ResolutionCache, WriteGuard};
pub use config::AuthzConfig;
pub use gate::{Decision, Gate};
pub use identity::FixedIdentity;
pub use resolver::{PermissionSet, Resolution, Resolver, is_reserved, resolve_grants};
pub use service::{AccessOverview, AdminService};
