//! # dirsync CLI entry point
//!
//! Parses command-line arguments, loads the node configuration and
//! dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dirsync_cli::cache::{run_cache, CacheArgs};
use dirsync_cli::config::NodeConfig;
use dirsync_cli::node::Node;
use dirsync_cli::publish::{run_publish, run_refresh, PublishArgs, RefreshArgs};
use dirsync_cli::run::{run_operation, RunArgs};
use dirsync_cli::sync::{run_directory, run_owner, run_read, run_status, run_sync, ReadArgs, StatusArgs};
use dirsync_engine::SnapshotCache;

/// dirsync: anchored directory snapshots over IPFS and an EVM registry.
///
/// Keeps a local copy of the directory whose content address the registry
/// contract holds, and publishes new versions of it.
#[derive(Parser, Debug)]
#[command(name = "dirsync", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// YAML configuration file. Environment variables are used otherwise.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Extra attempts for read-side commands that fail transiently.
    #[arg(long, global = true, default_value_t = 0)]
    retries: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read the anchor and report whether the cache is current.
    Status(StatusArgs),

    /// Fetch the anchored directory into the cache if it is missing.
    Sync,

    /// Print one collection of the anchored directory.
    Read(ReadArgs),

    /// Print the whole anchored directory.
    Directory,

    /// Store a directory export and anchor its address.
    Publish(PublishArgs),

    /// Publish a directory export only if it differs from the anchored one.
    Refresh(RefreshArgs),

    /// Print the registry contract owner.
    Owner,

    /// Inspect the local snapshot cache.
    Cache(CacheArgs),

    /// Run a knowledge-base function by name (init, update_from_hub, ...).
    Run(RunArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "dirsync starting");

    match dispatch(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn dispatch(cli: Cli) -> Result<u8> {
    let config = NodeConfig::load(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        // The cache needs no network collaborators.
        Commands::Cache(args) => {
            let cache = SnapshotCache::open(config.cache_dir.clone()).await?;
            run_cache(&args, &cache).await
        }
        command => run_connected(command, &config, cli.retries).await,
    }
}

async fn run_connected(command: Commands, config: &NodeConfig, retries: u32) -> Result<u8> {
    let (operation, assembler) = match &command {
        Commands::Run(args) => (Some(args.operation()?), args.input.clone()),
        _ => (None, None),
    };
    let node = Node::connect(config, assembler).await?;
    let engine = &node.engine;

    match (command, operation) {
        (Commands::Status(args), _) => run_status(&args, engine, retries).await,
        (Commands::Sync, _) => run_sync(engine, retries).await,
        (Commands::Read(args), _) => run_read(&args, engine, retries).await,
        (Commands::Directory, _) => run_directory(engine, retries).await,
        (Commands::Publish(args), _) => run_publish(&args, engine).await,
        (Commands::Refresh(args), _) => run_refresh(&args, engine).await,
        (Commands::Owner, _) => run_owner(&node.anchor).await,
        (Commands::Run(_), Some(op)) => run_operation(op, engine, retries).await,
        (Commands::Run(args), None) => bail!("cannot resolve function {}", args.func_name),
        (Commands::Cache(_), _) => bail!("cache commands do not connect to the network"),
    }
}
