//! # Read-side Subcommands
//!
//! - `status`: read the anchor and report whether the local cache is current.
//! - `sync`: bring the cache to the anchored root.
//! - `read <collection>`: print one collection of the anchored directory.
//! - `directory`: print the whole anchored directory.
//! - `owner`: print the registry contract owner.
//!
//! Each of these is safe to repeat and runs under the `--retries` policy.

use anyhow::Result;
use clap::Args;
use serde_json::{json, Value};

use dirsync_client::EvmAnchorClient;
use dirsync_engine::SyncEngine;

use crate::print_json;
use crate::retry::retry_with_backoff;

/// Arguments for `dirsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Exit with status 1 unless the cache holds the anchored root.
    #[arg(long)]
    pub exit_code: bool,
}

/// Arguments for `dirsync read`.
#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Collection name (servers, nodes, agents, tools, orchestrators,
    /// environments, personas, memories, kbs).
    pub collection: String,
}

pub async fn status_report(engine: &SyncEngine, retries: u32) -> Result<Value> {
    let state = retry_with_backoff(retries, "status", || engine.check_staleness()).await?;
    Ok(json!({
        "state": state,
        "synced": state.is_synced(),
        "cache_dir": engine.context().cache.dir().display().to_string(),
    }))
}

pub async fn run_status(args: &StatusArgs, engine: &SyncEngine, retries: u32) -> Result<u8> {
    let report = status_report(engine, retries).await?;
    print_json(&report)?;
    let synced = report["synced"].as_bool().unwrap_or(false);
    Ok(if args.exit_code && !synced { 1 } else { 0 })
}

pub async fn sync_report(engine: &SyncEngine, retries: u32) -> Result<Value> {
    let root = retry_with_backoff(retries, "sync", || async move {
        engine.check_staleness().await?;
        engine.resolve_stale().await
    })
    .await?;
    tracing::info!(root = %root, "cache synced");
    Ok(json!({ "root": root, "state": engine.state() }))
}

pub async fn run_sync(engine: &SyncEngine, retries: u32) -> Result<u8> {
    print_json(&sync_report(engine, retries).await?)?;
    Ok(0)
}

pub async fn read_report(args: &ReadArgs, engine: &SyncEngine, retries: u32) -> Result<Value> {
    let records = retry_with_backoff(retries, "read", || engine.read_named(&args.collection)).await?;
    Ok(Value::Array(records.into_iter().map(Value::Object).collect()))
}

pub async fn run_read(args: &ReadArgs, engine: &SyncEngine, retries: u32) -> Result<u8> {
    print_json(&read_report(args, engine, retries).await?)?;
    Ok(0)
}

pub async fn directory_report(engine: &SyncEngine, retries: u32) -> Result<Value> {
    let snapshot = retry_with_backoff(retries, "directory", || engine.directory()).await?;
    Ok(json!({
        "root": snapshot.address(),
        "records": snapshot.directory().record_count(),
        "directory": snapshot.directory(),
    }))
}

pub async fn run_directory(engine: &SyncEngine, retries: u32) -> Result<u8> {
    print_json(&directory_report(engine, retries).await?)?;
    Ok(0)
}

pub async fn run_owner(anchor: &EvmAnchorClient) -> Result<u8> {
    let owner = anchor.owner().await?;
    print_json(&json!({
        "contract": anchor.config().contract_address,
        "owner": owner,
    }))?;
    Ok(0)
}
