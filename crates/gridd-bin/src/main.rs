//! gridd - real-time document synchronization daemon for the grid editor.

mod app;
mod bridge;
mod executor;

use clap::{Parser, Subcommand};
use gridd_config_and_utils::{init_logging, Config, Paths};
use std::path::PathBuf;
use tracing::info;

/// gridd daemon command-line interface.
#[derive(Parser)]
#[command(name = "gridd")]
#[command(about = "Real-time sync daemon: OT document store and presence fan-out")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Base directory for runtime files (config, database, logs). Defaults to ~/.gridd
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon in the foreground
    Start {
        /// Redis connection URL
        #[arg(long, env = "GRIDD_REDIS_URL")]
        redis_url: Option<String>,

        /// Document database path
        #[arg(long, env = "GRIDD_DB_PATH")]
        db_path: Option<PathBuf>,

        /// Use the in-process bus instead of Redis (single-process mode)
        #[arg(long)]
        memory_bus: bool,
    },
    /// Execute one domain command (JSON file) against the store and exit
    Apply {
        /// Path to a JSON-encoded domain command
        file: PathBuf,

        /// Document database path
        #[arg(long, env = "GRIDD_DB_PATH")]
        db_path: Option<PathBuf>,

        /// Redis connection URL
        #[arg(long, env = "GRIDD_REDIS_URL")]
        redis_url: Option<String>,

        /// Use the in-process bus instead of Redis
        #[arg(long)]
        memory_bus: bool,
    },
    /// Show resolved configuration and database status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let mut config = Config::load(&paths)?;

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Start {
            redis_url,
            db_path,
            memory_bus,
        } => {
            if let Some(redis_url) = redis_url {
                config.redis_url = redis_url;
            }
            if let Some(db_path) = db_path {
                config.db_path = Some(db_path);
            }

            info!(
                redis_url = %config.redis_url,
                db_path = %config.database_path(&paths).display(),
                memory_bus,
                "Configuration loaded"
            );

            app::run(config, paths, memory_bus).await
        }
        Commands::Apply {
            file,
            db_path,
            redis_url,
            memory_bus,
        } => {
            if let Some(redis_url) = redis_url {
                config.redis_url = redis_url;
            }
            if let Some(db_path) = db_path {
                config.db_path = Some(db_path);
            }

            let raw = std::fs::read_to_string(&file)?;
            let command: op_builder::DomainCommand = serde_json::from_str(&raw)?;
            let plan = op_builder::build_plan(command)?;
            info!(
                key = %plan.meta.transaction_key,
                ops = plan.meta.op_count,
                "Executing command plan"
            );

            let state = app::build_state(config, paths, memory_bus).await?;
            let bridge_task =
                tokio::spawn(bridge::run(state.store.changes(), state.registry.clone()));
            let report = executor::execute_plan(&state.store, plan).await?;
            for outcome in &report.outcomes {
                println!(
                    "{}/{} -> v{}",
                    outcome.collection, outcome.id, outcome.version
                );
            }
            println!(
                "transaction {} committed ({} ops)",
                report.meta.transaction_key,
                report.outcomes.len()
            );

            // the bridge must drain its announcements before the bus closes
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            bridge_task.abort();
            state.registry.shutdown().await?;
            Ok(())
        }
        Commands::Status => {
            let db_path = config.database_path(&paths);
            println!("base dir:  {}", paths.base_dir().display());
            println!("redis url: {}", config.redis_url);
            println!(
                "database:  {} ({})",
                db_path.display(),
                if db_path.exists() { "present" } else { "missing" }
            );
            Ok(())
        }
    }
}
