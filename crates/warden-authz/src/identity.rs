//! Identity sources that need no authentication layer.

use warden_core::error::WardenResult;
use warden_core::models::user::User;
use warden_core::repository::IdentitySource;

/// An identity fixed at construction, e.g. the account an operator acts as
/// on the command line.
#[derive(Debug, Clone, Default)]
pub struct FixedIdentity {
    user: Option<User>,
}

impl FixedIdentity {
    pub fn new(user: User) -> Self {
        Self { user: Some(user) }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl IdentitySource for FixedIdentity {
    async fn current_identity(&self) -> WardenResult<Option<User>> {
        Ok(self.user.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn anonymous_has_no_identity() {
        assert!(FixedIdentity::anonymous().current_identity().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fixed_returns_the_user() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "Operator".into(),
            email: "ops@example.com".into(),
            password_hash: String::new(),
            role_id: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        };
        let identity = FixedIdentity::new(user.clone());
        assert_eq!(identity.current_identity().await.unwrap(), Some(user));
    }
}
