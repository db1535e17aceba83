//! Error types for the Warden core.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Accumulates field errors so every problem with a request is reported at
/// once instead of one per round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns true if at least one error was recorded for `field`.
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was recorded, otherwise a
    /// [`WardenError::Validation`] carrying every collected error.
    pub fn into_result(self) -> WardenResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(WardenError::Validation { errors: self })
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for e in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum WardenError {
    #[error("Validation failed: {errors}")]
    Validation { errors: ValidationErrors },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// The gate denied the operation. Carries only the missing permission,
    /// never anything about the target of the operation.
    #[error("Forbidden: missing permission `{permission}`")]
    Forbidden { permission: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WardenError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        WardenError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WardenError::NotFound { .. })
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, WardenError::Forbidden { .. })
    }
}

pub type WardenResult<T> = Result<T, WardenError>;
