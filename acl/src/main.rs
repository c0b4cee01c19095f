//! acl - role and permission administration
//!
//! Creates roles and permissions in the backing store and clears the shared
//! permission cache.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use acl::permissions::{commands, Acl, PgStore, RedisCacheStore};
use acl::{config, db};

/// acl - role and permission administration
#[derive(Parser, Debug)]
#[command(name = "acl")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Skip running database migrations on startup
    #[arg(long)]
    skip_migrations: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a role
    CreateRole {
        /// The name of the role
        name: String,
        /// The name of the guard
        guard: Option<String>,
    },

    /// Create a permission
    CreatePermission {
        /// The name of the permission
        name: String,
        /// The name of the guard
        guard: Option<String>,
    },

    /// Clear the ACL cache
    CacheClear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "acl=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    if !cli.skip_migrations {
        db::run_migrations(&pool).await?;
    }
    let redis = db::create_redis_client(&config.redis_url).await?;

    let acl = Acl::new(
        Arc::new(PgStore::new(pool)),
        Arc::new(RedisCacheStore::new(redis)),
        &config.acl,
    );
    info!(
        default_guard = acl.guards().system_default(),
        "ACL engine ready"
    );

    let output = match &cli.command {
        Commands::CreateRole { name, guard } => {
            commands::create_role(&acl, name, guard.as_deref()).await?
        }
        Commands::CreatePermission { name, guard } => {
            commands::create_permission(&acl, name, guard.as_deref()).await?
        }
        Commands::CacheClear => commands::clear_cache(&acl).await?,
    };

    println!("{output}");
    Ok(())
}
