//! Keyspace CLI
//!
//! Operator tool for inspecting and maintaining one tenant's keys. Keyed
//! commands go through the same namespacing as application code.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use keyspace_client::{NamespacedStore, ReadOnlyTracker};
use keyspace_core::{StaticNamespace, StoreConfig, TenantId, Value};

#[derive(Parser, Debug)]
#[command(name = "keyspace")]
#[command(about = "Keyspace - namespaced key-value store client", long_about = None)]
struct Cli {
    /// Store config file (YAML, or TOML with a .toml extension)
    #[arg(long, env = "KEYSPACE_CONFIG")]
    config: Option<PathBuf>,

    /// Environment section to use from the config file
    #[arg(long = "env", env = "KEYSPACE_ENV", default_value = "development")]
    environment: String,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    db: Option<i64>,

    /// Tenant whose namespace keyed commands use
    #[arg(long, env = "KEYSPACE_TENANT", default_value = "default")]
    tenant: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the connection URL
    Url,
    /// Check the connection
    Ping,
    /// Get a value
    Get { key: String },
    /// Set a value
    Set {
        key: String,
        value: String,
        /// Expire after this many seconds
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Delete a key
    Del { key: String },
    /// List keys of the namespace
    Keys {
        /// Glob pattern, `*` when omitted
        pattern: Option<String>,
    },
    /// Delete every key starting with a prefix
    DeletePrefix { prefix: String },
    /// Delete every key of the namespace
    FlushNamespace,
    /// Run an arbitrary command
    Exec {
        command: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// File, then environment variables, then command-line flags
fn load_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let config = match &cli.config {
        Some(path) => StoreConfig::from_file(path, Some(&cli.environment))
            .with_context(|| format!("loading {}", path.display()))?,
        None => StoreConfig::default(),
    };
    let mut config = config.with_env_overrides()?;

    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(db) = cli.db {
        config.db = db;
    }
    Ok(config)
}

fn render(value: &Value) -> String {
    match value {
        Value::Nil => "(nil)".to_string(),
        Value::Int(n) => format!("(integer) {}", n),
        Value::Data(bytes) => format!("{:?}", String::from_utf8_lossy(bytes)),
        Value::Status(status) => status.clone(),
        Value::Okay => "OK".to_string(),
        Value::Double(d) => format!("(double) {}", d),
        Value::Boolean(b) => format!("(boolean) {}", b),
        Value::Array(items) if items.is_empty() => "(empty array)".to_string(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}) {}", i + 1, render(item)))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let config = load_config(&cli)?;
    if let Commands::Url = cli.command {
        println!("{}", config.url());
        return Ok(());
    }

    let tenant = TenantId::new(cli.tenant.as_str())?;
    debug!("Using namespace {} on {}", tenant, config.redacted_url());
    let store = NamespacedStore::connect(
        config,
        Arc::new(StaticNamespace::new(tenant)),
        Arc::new(ReadOnlyTracker::new()),
    )
    .await?;

    match cli.command {
        Commands::Url => {}
        Commands::Ping => println!("{}", store.ping().await?.unwrap_or_default()),
        Commands::Get { key } => match store.get(&key).await? {
            Some(value) => println!("{}", value),
            None => println!("(nil)"),
        },
        Commands::Set { key, value, ttl } => {
            match ttl {
                Some(secs) => store.set_ex(&key, value, Duration::from_secs(secs)).await?,
                None => store.set(&key, value).await?,
            }
            if store.tracker().is_recently_read_only() {
                eprintln!("store is read-only, value not written");
            } else {
                println!("OK");
            }
        }
        Commands::Del { key } => println!("(integer) {}", store.del(&key).await?),
        Commands::Keys { pattern } => {
            for key in store.keys(pattern.as_deref()).await? {
                println!("{}", key);
            }
        }
        Commands::DeletePrefix { prefix } => {
            println!("(integer) {}", store.delete_prefixed(&prefix).await?)
        }
        Commands::FlushNamespace => println!("(integer) {}", store.flush_namespace().await?),
        Commands::Exec { command, args } => {
            let args = args.into_iter().map(Into::into).collect();
            println!("{}", render(&store.execute(&command, args).await?));
        }
    }

    Ok(())
}
