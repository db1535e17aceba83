use std::path::Path;

use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use warden_authz::AuthzConfig;
use warden_db::{Credentials, DbConfig, SeedAccount};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub database: Database,
    pub authz: Authz,
    pub seed: Seed,
    pub logging: Logging,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    /// `ws://host:port` for a SurrealDB server, or `mem://` for an
    /// in-process store
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials, used only by the WebSocket engine
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authz {
    pub cache_enabled: bool,
    pub cache_capacity: usize,
    pub min_password_length: usize,
    /// Server-side secret prepended to passwords before hashing
    pub pepper: Option<String>,
}

/// The default super-admin account written by `warden seed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seed {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    /// Used when RUST_LOG is unset
    pub filter: String,
    pub json: bool,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8000".to_string(),
            namespace: "warden".to_string(),
            database: "main".to_string(),
            username: "root".to_string(),
            password: "root".to_string(),
        }
    }
}

impl Default for Authz {
    fn default() -> Self {
        let authz = AuthzConfig::default();
        Self {
            cache_enabled: authz.cache_enabled,
            cache_capacity: authz.cache_capacity,
            min_password_length: authz.min_password_length,
            pepper: authz.pepper,
        }
    }
}

impl Default for Seed {
    fn default() -> Self {
        let account = SeedAccount::default();
        Self {
            name: account.name,
            email: account.email,
            password: account.password,
        }
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            filter: "warden=info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        let defaults = Settings::default();
        let mut builder = config::Config::builder()
            .set_default("database.endpoint", defaults.database.endpoint)
            .into_diagnostic()?
            .set_default("database.namespace", defaults.database.namespace)
            .into_diagnostic()?
            .set_default("database.database", defaults.database.database)
            .into_diagnostic()?
            .set_default("database.username", defaults.database.username)
            .into_diagnostic()?
            .set_default("database.password", defaults.database.password)
            .into_diagnostic()?
            .set_default("authz.cache_enabled", defaults.authz.cache_enabled)
            .into_diagnostic()?
            .set_default("authz.cache_capacity", defaults.authz.cache_capacity as u64)
            .into_diagnostic()?
            .set_default(
                "authz.min_password_length",
                defaults.authz.min_password_length as u64,
            )
            .into_diagnostic()?
            .set_default("seed.name", defaults.seed.name)
            .into_diagnostic()?
            .set_default("seed.email", defaults.seed.email)
            .into_diagnostic()?
            .set_default("seed.password", defaults.seed.password)
            .into_diagnostic()?
            .set_default("logging.filter", defaults.logging.filter)
            .into_diagnostic()?
            .set_default("logging.json", defaults.logging.json)
            .into_diagnostic()?;

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: WARDEN__DATABASE__ENDPOINT=ws://10.0.0.5:8000, etc.
        builder = builder.add_source(config::Environment::with_prefix("WARDEN").separator("__"));

        let cfg = builder.build().into_diagnostic()?;
        cfg.try_deserialize().into_diagnostic()
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            endpoint: self.database.endpoint.clone(),
            namespace: self.database.namespace.clone(),
            database: self.database.database.clone(),
            credentials: Some(Credentials {
                username: self.database.username.clone(),
                password: self.database.password.clone(),
            }),
        }
    }

    pub fn authz_config(&self) -> AuthzConfig {
        AuthzConfig {
            cache_enabled: self.authz.cache_enabled,
            cache_capacity: self.authz.cache_capacity,
            min_password_length: self.authz.min_password_length,
            pepper: self.authz.pepper.clone(),
            ..AuthzConfig::default()
        }
    }

    pub fn seed_account(&self) -> SeedAccount {
        SeedAccount {
            name: self.seed.name.clone(),
            email: self.seed.email.clone(),
            password: self.seed.password.clone(),
        }
    }
}
