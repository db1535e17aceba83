//! Domain models for Warden.
//!
//! These are the core types shared across all crates.

pub mod package;
pub mod permission;
pub mod role;
pub mod user;
