//! Authorization gate.
//!
//! Runs before every permission-gated operation. It is stateless beyond
//! delegating to the [`Resolver`] and never looks at the operation's
//! target, so a denial leaks nothing about whether the target exists.

use tracing::warn;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::user::User;
use warden_core::repository::AccessRepository;

use crate::resolver::Resolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

pub struct Gate<'a, A: AccessRepository> {
    resolver: &'a Resolver<A>,
}

impl<'a, A: AccessRepository> Gate<'a, A> {
    pub fn new(resolver: &'a Resolver<A>) -> Self {
        Self { resolver }
    }

    /// Decide whether `identity` may perform an operation that requires
    /// `required`. A missing identity is denied.
    pub async fn authorize(&self, identity: Option<&User>, required: &str) -> WardenResult<Decision> {
        let Some(user) = identity else {
            warn!(permission = required, "Denied: no identity");
            return Ok(Decision::Deny);
        };

        match self.resolver.check(user.id, required).await {
            Ok(true) => Ok(Decision::Allow),
            Ok(false) => {
                warn!(user_id = %user.id, permission = required, "Denied: permission not held");
                Ok(Decision::Deny)
            }
            // The acting account was deleted after it was authenticated.
            Err(e) if e.is_not_found() => {
                warn!(user_id = %user.id, permission = required, "Denied: unknown identity");
                Ok(Decision::Deny)
            }
            Err(e) => Err(e),
        }
    }

    /// Like [`authorize`](Self::authorize), but turns a denial into
    /// [`WardenError::Forbidden`] and hands back the acting user.
    pub async fn require<'u>(&self, identity: Option<&'u User>, required: &str) -> WardenResult<&'u User> {
        match (self.authorize(identity, required).await?, identity) {
            (Decision::Allow, Some(user)) => Ok(user),
            _ => Err(WardenError::Forbidden {
                permission: required.to_string(),
            }),
        }
    }
}
