//! Repowatch CLI - keeps a local mirror of GitHub repository commits.

mod api;
mod commands;
mod config;
mod monitor;
mod shutdown;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use repowatch::platform::RepoRef;
use repowatch::store::CommitFilter;
use repowatch::sync::SyncService;
use tracing_subscriber::EnvFilter;

use crate::commands::parse_datetime;
use crate::commands::query::OutputFormat;

#[derive(Parser)]
#[command(name = "repowatch")]
#[command(version)]
#[command(about = "Mirror and query GitHub repository commit history")]
#[command(
    long_about = "Repowatch keeps a local database of repository metadata and commits in sync \
with GitHub. It polls each tracked repository on a fixed interval, resuming from the last \
successful sync, and serves the collected data over a small JSON API."
)]
#[command(after_long_help = r#"EXAMPLES
    Start the poll workers and the API (syncs chromium/chromium on first run):
        $ repowatch serve

    Sync one repository now:
        $ repowatch sync rust-lang/rust

    Drop stored commits and re-collect from a date:
        $ repowatch reset rust-lang/rust --since 2024-01-01

    Show the most active authors:
        $ repowatch authors rust-lang/rust --limit 5

CONFIGURATION
    Repowatch reads configuration from:
      1. ~/.config/repowatch/config.toml (or $XDG_CONFIG_HOME/repowatch/config.toml)
      2. ./repowatch.toml
      3. Environment variables (REPOWATCH_* prefix, `__` between section and key)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    REPOWATCH_DATABASE__URL             Database connection string (default: ~/.local/state/repowatch/repowatch.db)
    REPOWATCH_GITHUB__TOKEN             GitHub personal access token
    REPOWATCH_SYNC__INTERVAL_SECS       Poll interval in seconds (default: 3600)
    REPOWATCH_SYNC__DEFAULT_REPOSITORY  Repository synced when none is tracked (default: chromium/chromium)
    REPOWATCH_API__BIND                 API listen address (default: 127.0.0.1:8081)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Run poll workers and the query API
    Serve,
    /// Sync one repository now
    Sync {
        /// Repository as owner/name
        repo: RepoRef,
        /// Fetch commits authored at or after this time (RFC 3339 or YYYY-MM-DD)
        #[arg(short, long, value_parser = parse_datetime, conflicts_with = "full")]
        since: Option<chrono::DateTime<chrono::Utc>>,
        /// Ignore the stored watermark and fetch the full history
        #[arg(long)]
        full: bool,
    },
    /// Delete stored commits and re-collect from a point in time
    Reset {
        /// Repository as owner/name
        repo: RepoRef,
        /// New collection start (RFC 3339 or YYYY-MM-DD)
        #[arg(short, long, value_parser = parse_datetime)]
        since: chrono::DateTime<chrono::Utc>,
    },
    /// List stored commits, newest first
    Commits {
        /// Repository as owner/name
        repo: RepoRef,
        #[arg(short, long, value_parser = parse_datetime)]
        since: Option<chrono::DateTime<chrono::Utc>>,
        #[arg(short, long, value_parser = parse_datetime)]
        until: Option<chrono::DateTime<chrono::Utc>>,
        #[arg(short, long, default_value_t = 30)]
        limit: u64,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Show the authors with the most stored commits
    Authors {
        /// Repository as owner/name
        repo: RepoRef,
        #[arg(short, long, default_value_t = 10)]
        limit: u64,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

/// Connect, bring the schema up to date, and build the sync service.
async fn open_service(
    config: &config::Config,
    database_url: &str,
) -> Result<Arc<SyncService>, Box<dyn std::error::Error>> {
    let db = repowatch::connect_and_migrate(database_url).await?;
    commands::build_service(config, db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("repowatch=info,repowatch_cli=info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load()?;
    config.validate()?;

    let database_url = config.database_url()?;

    // Ensure the database directory exists for SQLite
    if database_url.starts_with("sqlite://") {
        let db_path = database_url.trim_start_matches("sqlite://");
        // Strip query parameters (e.g., ?mode=rwc) before path operations
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        let db_path = std::path::Path::new(db_path);

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }

    match cli.command {
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        Commands::Serve => {
            let service = open_service(&config, &database_url).await?;
            commands::serve::handle_serve(&config, service).await?;
        }
        Commands::Sync { repo, since, full } => {
            let service = open_service(&config, &database_url).await?;
            commands::sync::handle_sync(&service, &repo, since, full).await?;
        }
        Commands::Reset { repo, since } => {
            let service = open_service(&config, &database_url).await?;
            commands::sync::handle_reset(&service, &repo, since).await?;
        }
        Commands::Commits {
            repo,
            since,
            until,
            limit,
            output,
        } => {
            let service = open_service(&config, &database_url).await?;
            let filter = CommitFilter { since, until };
            commands::query::handle_commits(&service, &repo, filter, limit, output).await?;
        }
        Commands::Authors {
            repo,
            limit,
            output,
        } => {
            let service = open_service(&config, &database_url).await?;
            commands::query::handle_authors(&service, &repo, limit, output).await?;
        }
    }

    Ok(())
}
