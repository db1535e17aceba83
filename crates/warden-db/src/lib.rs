//! Warden Database — SurrealDB connection management, schema migrations,
//! repository implementations and seeding.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Implementations of the `warden-core` repository traits ([`repository`])
//! - Idempotent seeding of the catalogue and built-in bundles ([`Seeder`])
//! - Error types ([`DbError`])

mod connection;
mod error;
pub mod repository;
mod schema;
mod seed;

pub use connection::{Credentials, DbConfig, DbManager, Engine};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
pub use seed::{SeedAccount, SeedReport, Seeder};
