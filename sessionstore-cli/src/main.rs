use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use sessionstore_core::config::DataStoreConfig;
use sessionstore_core::core_session::MemorySessionHub;
use sessionstore_core::logging::{init_logging_with_config, LogLevel};
use sessionstore_core::metrics::init_metrics;
use sessionstore_core::{ClientDataStore, ResultCode};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "sessionstore")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Read configuration from a TOML file instead of the environment
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Allocate unique camera ids from several clients of one in-process session
    Demo {
        /// Number of connected clients
        #[arg(long, default_value_t = 3)]
        clients: usize,

        /// Ids allocated by each client
        #[arg(long, default_value_t = 5)]
        allocations: usize,

        /// Disable server pushes to other clients
        #[arg(long)]
        no_replication: bool,
    },
    /// Print the effective configuration, or write it to a file
    Config {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_config(args: &Args) -> Result<DataStoreConfig> {
    let mut config = match &args.config {
        Some(path) => DataStoreConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => DataStoreConfig::from_env().context("Invalid environment configuration")?,
    };

    if let Some(level) = &args.log_level {
        if LogLevel::from_str(level).is_none() {
            eprintln!("Invalid log level '{}', using '{}'", level, config.logging.level);
        } else {
            config.logging.level = level.clone();
        }
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    Ok(config)
}

/// Allocate the next id of `key`, retrying on concurrent updates.
async fn allocate_id(client: &ClientDataStore, key: &str) -> Result<i64> {
    let mut current = client
        .fetch_or_add(key, &0i64)
        .await
        .into_value()
        .with_context(|| format!("{} is not readable as an integer", key))?;
    let mut attempts = 1u32;

    loop {
        let result = client.compare_exchange(key, &current, &(current + 1)).await;
        match result.code() {
            ResultCode::Exchanged => {
                debug!(id = current + 1, attempts, "Allocated id");
                return Ok(current + 1);
            }
            ResultCode::Fetched => {
                current = result.into_value().context("Fetched result without a value")?;
                attempts += 1;
            }
            code => anyhow::bail!("Allocation of {} failed: {}", key, code),
        }
    }
}

async fn run_demo(
    config: &DataStoreConfig,
    clients: usize,
    allocations: usize,
    no_replication: bool,
) -> Result<()> {
    let mut server_config = config.server.clone();
    if no_replication {
        server_config.content_replication_enabled = false;
    }

    let hub = MemorySessionHub::start(&server_config);
    let mut connected: Vec<Arc<ClientDataStore>> = Vec::with_capacity(clients);
    for _ in 0..clients {
        connected.push(hub.connect_client(&config.client).await?);
    }
    info!(clients, allocations, replication = server_config.content_replication_enabled, "Session ready");

    let tasks: Vec<_> = connected
        .iter()
        .cloned()
        .enumerate()
        .map(|(index, client)| {
            tokio::spawn(async move {
                let mut ids = Vec::with_capacity(allocations);
                for _ in 0..allocations {
                    ids.push(allocate_id(&client, "CameraId").await?);
                }
                Ok::<_, anyhow::Error>((index, ids))
            })
        })
        .collect();

    let mut report = Vec::with_capacity(clients);
    for task in tasks {
        let (index, ids) = task.await??;
        report.push(json!({ "client": index, "camera_ids": ids }));
    }

    let last = connected
        .first()
        .and_then(|client| client.fetch_as::<i64>("CameraId").into_value());
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "clients": report, "last_cached_id": last }))?
    );

    drop(connected);
    hub.shutdown().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logging_with_config(config.logging.to_log_config()?)?;
    init_metrics();

    info!("Session store CLI started");

    match args.command {
        Some(Command::Demo { clients, allocations, no_replication }) => {
            if clients == 0 {
                warn!("No clients requested, nothing to do");
            } else {
                run_demo(&config, clients, allocations, no_replication).await?;
            }
        }
        Some(Command::Config { output: Some(path) }) => {
            config.save_to_file(&path)?;
            info!("Configuration written to {}", path.display());
        }
        Some(Command::Config { output: None }) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        None => {
            info!("No command specified. Use --help for usage information.");
        }
    }

    info!("Session store CLI finished");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_demo() {
        let args =
            Args::try_parse_from(["sessionstore", "demo", "--clients", "4", "--no-replication"])
                .unwrap();
        match args.command {
            Some(Command::Demo { clients, allocations, no_replication }) => {
                assert_eq!(clients, 4);
                assert_eq!(allocations, 5);
                assert!(no_replication);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_invalid_count_is_rejected() {
        assert!(Args::try_parse_from(["sessionstore", "demo", "--clients", "many"]).is_err());
    }

    #[test]
    fn test_config_file_and_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.toml");
        let mut file_config = DataStoreConfig::default();
        file_config.client.compare_exchange_payload_threshold = 16;
        file_config.save_to_file(&path).unwrap();

        let args = Args::try_parse_from([
            "sessionstore",
            "--config",
            path.to_str().unwrap(),
            "--log-level",
            "debug",
            "--json-logs",
        ])
        .unwrap();
        let config = load_config(&args).unwrap();
        assert_eq!(config.client.compare_exchange_payload_threshold, 16);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
    }

    #[tokio::test]
    async fn test_demo_allocates_unique_ids() {
        let hub = MemorySessionHub::with_replication(true);
        let a = hub.connect_client(&Default::default()).await.unwrap();
        let b = hub.connect_client(&Default::default()).await.unwrap();

        assert_eq!(allocate_id(&a, "CameraId").await.unwrap(), 1);
        assert_eq!(allocate_id(&b, "CameraId").await.unwrap(), 2);
        assert!(allocate_id(&a, "Missing").await.is_ok());

        a.fetch_or_add("Label", &true).await;
        assert!(allocate_id(&a, "Label").await.is_err());
    }
}
