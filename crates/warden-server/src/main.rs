//! Warden bootstrap binary and operator CLI.

mod settings;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{EnvFilter, fmt};
use warden_authz::{Decision, FixedIdentity, Gate, Resolver};
use warden_core::repository::{IdentitySource, UserRepository};
use warden_db::repository::{SurrealAccessRepository, SurrealUserRepository};
use warden_db::{DbManager, Seeder};

use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "warden", version, about = "Role and package based access control")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "warden.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply migrations and seed the catalogue, built-in roles, starter
    /// packages and the default super-admin account
    Seed,
    /// Print the resolved permission set of a user
    Permissions {
        #[arg(long)]
        email: String,
    },
    /// Print whether a user holds a permission; exits 1 on deny
    Check {
        #[arg(long)]
        email: String,
        #[arg(long)]
        permission: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;

    // logging
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter));
    if settings.logging.json {
        fmt().json().with_env_filter(env_filter).init();
    } else {
        fmt().with_env_filter(env_filter).init();
    }
    tracing::info!(config = %cli.config, "Loaded configuration");

    let manager = DbManager::connect(&settings.db_config())
        .await
        .into_diagnostic()?;
    let db = manager.client().clone();
    let authz = settings.authz_config();

    match cli.command {
        Command::Seed => {
            warden_db::run_migrations(&db).await.into_diagnostic()?;
            let report = Seeder::new(db, authz.pepper.clone())
                .run(&settings.seed_account())
                .await
                .into_diagnostic()?;
            println!(
                "seeded: {} permissions, {} roles, {} packages, account {}",
                report.permissions_created,
                report.roles_created,
                report.packages_created,
                if report.account_created { "created" } else { "refreshed" },
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Permissions { email } => {
            let user = SurrealUserRepository::new(db.clone())
                .get_by_email(&email)
                .await
                .into_diagnostic()?;
            let resolver = Resolver::new(SurrealAccessRepository::new(db), &authz);
            for slug in resolver.resolve(user.id).await.into_diagnostic()? {
                println!("{slug}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { email, permission } => {
            let user = SurrealUserRepository::new(db.clone())
                .get_by_email(&email)
                .await
                .into_diagnostic()?;
            let identity = FixedIdentity::new(user)
                .current_identity()
                .await
                .into_diagnostic()?;
            let resolver = Resolver::new(SurrealAccessRepository::new(db), &authz);
            let decision = Gate::new(&resolver)
                .authorize(identity.as_ref(), &permission)
                .await
                .into_diagnostic()?;
            match decision {
                Decision::Allow => {
                    println!("allow");
                    Ok(ExitCode::SUCCESS)
                }
                Decision::Deny => {
                    println!("deny");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
