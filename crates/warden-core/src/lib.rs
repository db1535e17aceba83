//! Warden Core — domain models, error types, the edge-update policy and
//! repository contracts shared by every Warden crate.

pub mod catalogue;
pub mod edge;
pub mod error;
pub mod models;
pub mod repository;
pub mod slug;

pub use edge::{EdgeChange, EdgeUpdate};
pub use error::{FieldError, ValidationErrors, WardenError, WardenResult};
