//! # Safe Queue CLI
//!
//! Command-line interface for operating a safe-queue instance.
//!
//! This module provides CLI commands for:
//! - Pushing, popping and checking out messages
//! - Acknowledging checked out messages by receipt
//! - Inspecting and purging a queue
//! - Showing the resolved configuration
//!
//! Results are written to stdout; logs go to stderr.

use clap::{Parser, Subcommand};
use safe_queue::{
    ConfigurationError, Message, QueueClient, QueueClientFactory, QueueConfig, QueueError,
    Receipt, StoreConfig,
};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

// ============================================================================
// CLI Structure
// ============================================================================

/// Safe Queue CLI - FIFO queue with acknowledged delivery
#[derive(Debug, Parser)]
#[command(name = "safe-queue")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Durable FIFO queue with visibility-timeout acknowledgment")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SAFE_QUEUE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level, used when RUST_LOG is not set
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Redis URL, overriding the configured store
    #[arg(long)]
    pub redis_url: Option<String>,

    /// Queue name, overriding the configured name
    #[arg(short, long)]
    pub queue: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Append messages to the queue tail
    Push {
        /// Payloads to push, in order
        #[arg(required = true)]
        payloads: Vec<String>,
    },

    /// Remove the head message without acknowledgment tracking
    Pop,

    /// Check out one message and print its receipt
    Checkout {
        /// Acknowledge immediately and print the payload
        #[arg(long)]
        ack: bool,
    },

    /// Acknowledge a checked out message
    Ack {
        /// Receipt printed by `checkout`
        receipt: String,
    },

    /// Show queue and pending set sizes
    Stats {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete the queue and its pending set
    Purge {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Show resolved configuration
    Config {
        /// Output format for configuration
        #[arg(short = 'f', long, default_value = "yaml")]
        format: ConfigFormat,
    },
}

/// Output format options
#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// Configuration format options
#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Output formatting failed: {message}")]
    Output { message: String },
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    run(cli).await
}

/// Execute a parsed command line
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_configuration(&cli)?;

    match &cli.command {
        Commands::Config { format } => return execute_config_command(&config, format),
        Commands::Purge { yes: false } => {
            return Err(CliError::InvalidArgument {
                arg: "--yes".to_string(),
                message: "purge deletes every queued and pending message; pass --yes to confirm"
                    .to_string(),
            })
        }
        _ => {}
    }

    let client = QueueClientFactory::create_client(&config).await?;

    match cli.command {
        Commands::Push { payloads } => execute_push_command(client.as_ref(), &payloads).await,
        Commands::Pop => execute_pop_command(client.as_ref()).await,
        Commands::Checkout { ack } => execute_checkout_command(client.as_ref(), ack).await,
        Commands::Ack { receipt } => execute_ack_command(client.as_ref(), &receipt).await,
        Commands::Stats { format } => execute_stats_command(client.as_ref(), &format).await,
        Commands::Purge { .. } => execute_purge_command(client.as_ref()).await,
        // Handled before connecting
        Commands::Config { .. } => Ok(()),
    }
}

// ============================================================================
// Setup
// ============================================================================

/// Initialize logging based on CLI arguments
fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cli.log_level).map_err(|e| CliError::InvalidArgument {
            arg: "--log-level".to_string(),
            message: e.to_string(),
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = if cli.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::CommandFailed {
        message: format!("logging initialization failed: {}", e),
    })
}

/// Load configuration and apply command-line overrides
pub fn load_configuration(cli: &Cli) -> Result<QueueConfig, CliError> {
    let mut config = QueueConfig::load(cli.config.as_deref())?;
    apply_overrides(&mut config, cli);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut QueueConfig, cli: &Cli) {
    if let Some(url) = &cli.redis_url {
        config.store = StoreConfig::Redis { url: url.clone() };
    }
    if let Some(queue) = &cli.queue {
        config.queue.name = queue.clone();
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn execute_push_command(
    client: &dyn QueueClient,
    payloads: &[String],
) -> Result<(), CliError> {
    for payload in payloads {
        client.push(payload.as_bytes()).await?;
    }
    info!(count = payloads.len(), "Pushed messages");
    println!("pushed {}", payloads.len());
    Ok(())
}

async fn execute_pop_command(client: &dyn QueueClient) -> Result<(), CliError> {
    match client.pop().await? {
        Some(message) => print_payload(message.payload())?,
        None => info!("Queue is empty"),
    }
    Ok(())
}

async fn execute_checkout_command(client: &dyn QueueClient, ack: bool) -> Result<(), CliError> {
    let Some(message) = client.checkout().await? else {
        info!("No message available");
        return Ok(());
    };

    if ack {
        message.acknowledge().await?;
        print_payload(message.payload())?;
    } else {
        println!("{}", message.receipt());
    }
    Ok(())
}

async fn execute_ack_command(client: &dyn QueueClient, receipt: &str) -> Result<(), CliError> {
    let receipt = parse_receipt(receipt)?;
    client.acknowledge(&Message::checked_out(receipt)).await?;
    println!("acknowledged");
    Ok(())
}

/// Write payload bytes unchanged, followed by a newline
fn print_payload(payload: &[u8]) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(payload)
        .and_then(|()| stdout.write_all(b"\n"))
        .map_err(|e| CliError::Output {
            message: e.to_string(),
        })
}

async fn execute_stats_command(
    client: &dyn QueueClient,
    format: &OutputFormat,
) -> Result<(), CliError> {
    let stats = client.stats().await?;
    match format {
        OutputFormat::Text => {
            println!("queued: {}", stats.queued);
            println!("pending: {}", stats.pending);
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "queued": stats.queued,
                "pending": stats.pending,
            });
            println!("{}", value);
        }
    }
    Ok(())
}

async fn execute_purge_command(client: &dyn QueueClient) -> Result<(), CliError> {
    client.purge().await?;
    warn!("Queue purged");
    println!("purged");
    Ok(())
}

fn execute_config_command(config: &QueueConfig, format: &ConfigFormat) -> Result<(), CliError> {
    print!("{}", render_config(config, format)?);
    Ok(())
}

/// Render configuration in the requested format
pub fn render_config(config: &QueueConfig, format: &ConfigFormat) -> Result<String, CliError> {
    match format {
        ConfigFormat::Yaml => serde_yaml::to_string(config).map_err(|e| CliError::Output {
            message: e.to_string(),
        }),
        ConfigFormat::Json => serde_json::to_string_pretty(config)
            .map(|json| json + "\n")
            .map_err(|e| CliError::Output {
                message: e.to_string(),
            }),
    }
}

/// Parse a receipt given on the command line
pub fn parse_receipt(receipt: &str) -> Result<Receipt, CliError> {
    receipt
        .parse::<Receipt>()
        .map_err(|e| CliError::InvalidArgument {
            arg: "receipt".to_string(),
            message: e.to_string(),
        })
}
