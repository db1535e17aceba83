//! Authorization configuration.

/// Configuration for the resolver, its cache and the administrative
/// service.
#[derive(Debug, Clone)]
pub struct AuthzConfig {
    /// Cache resolved permissions per user (default: on).
    pub cache_enabled: bool,
    /// Maximum number of cached users before the cache is flushed
    /// (default: 1024).
    pub cache_capacity: usize,
    /// Minimum password length accepted on create/update (default: 6).
    pub min_password_length: usize,
    /// Maximum length of user, role and package names (default: 255).
    pub max_name_length: usize,
    /// Optional pepper prepended to passwords before Argon2id hashing.
    pub pepper: Option<String>,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_capacity: 1024,
            min_password_length: 6,
            max_name_length: 255,
            pepper: None,
        }
    }
}
