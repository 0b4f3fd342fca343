mod mapping;
mod sync;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::mapping::{MappingCommands, ProfilesCommands};
use crate::sync::SyncCommands;

#[derive(Debug, Parser)]
#[command(name = "dcsync-cli")]
#[command(about = "Commerce to Odoo sync command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run and inspect sync jobs
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Inspect the local ↔ Odoo identity map
    Mapping {
        #[command(subcommand)]
        command: MappingCommands,
    },
    /// Inspect customer profiles
    Profiles {
        #[command(subcommand)]
        command: ProfilesCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let log_level = std::env::var("DCSYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("dcsync-cli: no command given; see --help");
        return Ok(());
    };

    let pool = dcsync_db::connect_pool_from_env().await?;
    match command {
        Commands::Db { command } => run_db(&pool, command).await,
        Commands::Sync { command } => sync::run_sync(&pool, command).await,
        Commands::Mapping { command } => mapping::run_mapping(&pool, command).await,
        Commands::Profiles { command } => mapping::run_profiles(&pool, command).await,
    }
}

async fn run_db(pool: &sqlx::PgPool, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            dcsync_db::health_check(pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = dcsync_db::run_migrations(pool).await?;
            println!("applied {applied} migration(s)");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
