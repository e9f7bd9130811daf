//! # Cache Subcommand
//!
//! Inspects the local snapshot cache without touching the network.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::{json, Value};

use dirsync_core::ContentAddress;
use dirsync_engine::SnapshotCache;

use crate::print_json;

/// Arguments for the `dirsync cache` subcommand.
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// List the content addresses held in the cache.
    List,

    /// Print the cached directory for one content address.
    Show {
        /// Content address of the entry.
        address: String,
    },
}

pub async fn cache_report(args: &CacheArgs, cache: &SnapshotCache) -> Result<Value> {
    match &args.command {
        CacheCommand::List => {
            let entries = cache.entries().await?;
            Ok(json!({
                "cache_dir": cache.dir().display().to_string(),
                "entries": entries,
            }))
        }
        CacheCommand::Show { address } => {
            let address = ContentAddress::new(address.as_str())?;
            let directory = cache.load(&address).await?;
            Ok(json!({ "root": address, "directory": directory }))
        }
    }
}

pub async fn run_cache(args: &CacheArgs, cache: &SnapshotCache) -> Result<u8> {
    print_json(&cache_report(args, cache).await?)?;
    Ok(0)
}
