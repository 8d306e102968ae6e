use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recall::config::Config;
use recall::store::MemoryStore;
use recall::{RememberCache, RepositoryCache, StoreClient};
use recall_core::cache::{to_record, Connector, KeyBuilder};

/// Recall - Inspect and maintain the remember/forget cache
#[derive(Parser, Debug)]
#[command(name = "recall")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: Global,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, clap::Args)]
struct Global {
    /// Redis connection URL
    #[arg(long, global = true, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Key namespace
    #[arg(long, short, global = true, env = "CACHE_NAMESPACE")]
    namespace: Option<String>,

    /// Dry run against an empty in-process store instead of Redis.
    ///
    /// Nothing persists between runs, so `delete-matching` always reports 0
    /// and `flush` has nothing to drop. Useful to check configuration and
    /// the command path without a Redis server.
    #[arg(long, global = true)]
    memory: bool,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Print the keys derived from an argument object
    Key {
        /// Key prefix, usually the resource name
        #[arg(long, short)]
        prefix: String,

        /// Arguments as a JSON object, e.g. '{"id":7}'
        #[arg(long, short, default_value = "{}")]
        args: String,

        /// Identity columns, comma separated
        #[arg(long, value_delimiter = ',')]
        id_columns: Vec<String>,
    },

    /// Delete every key in the namespace matching a glob pattern
    DeleteMatching {
        /// Pattern below the namespace (default: everything)
        #[arg(default_value = "*")]
        pattern: String,
    },

    /// Delete everything in the store
    Flush,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recall=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env();
    if let Some(url) = cli.global.redis_url.clone() {
        config.redis_url = url;
    }
    if let Some(namespace) = cli.global.namespace.clone() {
        config.namespace = namespace;
    }

    match cli.command {
        Commands::Key {
            prefix,
            args,
            id_columns,
        } => print_keys(&config.key_builder(), &prefix, &args, &id_columns),
        command => {
            if cli.global.memory {
                tracing::warn!("Dry run: using an empty in-process store");
                run_store_command(MemoryStore::new(), &config, command).await
            } else {
                run_redis_command(&config, command).await
            }
        }
    }
}

fn print_keys(keys: &KeyBuilder, prefix: &str, args: &str, id_columns: &[String]) -> Result<()> {
    let value: serde_json::Value =
        serde_json::from_str(args).context("--args is not valid JSON")?;
    let record = to_record(&value)?;

    println!("root:      {}", keys.build_root_key(prefix));
    println!("composite: {}", keys.build_key(prefix, &record, None));
    if !id_columns.is_empty() {
        let columns: Vec<&str> = id_columns.iter().map(String::as_str).collect();
        println!("identity:  {}", keys.build_id_key(prefix, &columns, &record, None)?);
    }
    Ok(())
}

#[cfg(feature = "redis")]
async fn run_redis_command(config: &Config, command: Commands) -> Result<()> {
    let connector = recall::store::RedisConnector::new(&config.redis_url)?;
    run_store_command(connector, config, command).await
}

#[cfg(not(feature = "redis"))]
async fn run_redis_command(_config: &Config, _command: Commands) -> Result<()> {
    anyhow::bail!("built without the `redis` feature; pass --memory")
}

async fn run_store_command<K: Connector>(
    connector: K,
    config: &Config,
    command: Commands,
) -> Result<()> {
    let client = StoreClient::connect(connector, config.store_options()?)
        .await
        .with_context(|| format!("Unable to connect to {}", config.redis_url))?
        .with_scan_options(config.scan_options()?);
    let client = Arc::new(client);
    let cache = RememberCache::new(Arc::clone(&client));
    let repo = RepositoryCache::new(cache, config.key_builder());

    let outcome = match command {
        Commands::DeleteMatching { pattern } => {
            repo.delete_matching(&pattern).await.map(|deleted| {
                let matched = repo.keys().build_pattern(&pattern);
                println!("deleted {deleted} keys matching {matched}");
            })
        }
        Commands::Flush => repo.flush().await.map(|()| println!("flushed")),
        Commands::Key { .. } => Ok(()),
    };

    client.shutdown().await;
    outcome?;
    Ok(())
}
