//! Opening the store.
//!
//! Warden runs against a SurrealDB server over WebSocket in production and
//! against the in-process memory engine for tests and one-off runs. Both go
//! through the `any` engine so the repositories see a single client type.

use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;

/// Which engine backs the store, parsed from an endpoint string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Engine {
    /// `mem://`
    Memory,
    /// `ws://host:port`, or a bare `host:port`.
    WebSocket(String),
}

impl Engine {
    pub fn parse(endpoint: &str) -> Self {
        let endpoint = endpoint.trim();
        if endpoint == "mem" || endpoint.starts_with("mem://") {
            return Engine::Memory;
        }
        let host = endpoint.strip_prefix("ws://").unwrap_or(endpoint);
        Engine::WebSocket(host.trim_end_matches('/').to_string())
    }

    fn address(&self) -> String {
        match self {
            Engine::Memory => "mem://".to_string(),
            Engine::WebSocket(host) => format!("ws://{host}"),
        }
    }
}

/// Root credentials for a remote server.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Where and as whom to connect. Defaults live with the settings loader.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub endpoint: String,
    pub namespace: String,
    pub database: String,
    /// Ignored by the memory engine.
    pub credentials: Option<Credentials>,
}

#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
    engine: Engine,
}

impl DbManager {
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        let engine = Engine::parse(&config.endpoint);
        info!(
            engine = ?engine,
            namespace = %config.namespace,
            database = %config.database,
            "Opening store"
        );

        let db = any::connect(engine.address()).await?;
        if let (Engine::WebSocket(_), Some(credentials)) = (&engine, &config.credentials) {
            db.signin(Root {
                username: credentials.username.clone(),
                password: credentials.password.clone(),
            })
            .await?;
        }
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        Ok(Self { db, engine })
    }

    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}
