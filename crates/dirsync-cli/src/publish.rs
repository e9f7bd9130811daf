//! # Write-side Subcommands
//!
//! `publish` stores a directory export and anchors its address; `refresh`
//! does the same only when the export differs from the anchored directory.
//!
//! Neither runs under `--retries`: a proposal that timed out may still be
//! included, and the caller should look at `status` before trying again.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use dirsync_engine::{DirectoryAssembler, JsonFileAssembler, SyncEngine};

use crate::print_json;

/// Arguments for `dirsync publish`.
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Directory export (JSON object keyed by collection name).
    pub file: PathBuf,

    /// Re-read the anchor after publishing and fail if it holds another root.
    #[arg(long)]
    pub verify: bool,
}

/// Arguments for `dirsync refresh`.
#[derive(Args, Debug)]
pub struct RefreshArgs {
    /// Directory export to compare against the anchored directory.
    pub file: PathBuf,
}

pub async fn publish_report(args: &PublishArgs, engine: &SyncEngine) -> Result<Value> {
    let directory = JsonFileAssembler::new(&args.file)
        .assemble()
        .await
        .with_context(|| format!("failed to load directory export {}", args.file.display()))?;

    let receipt = if args.verify {
        engine.publish_and_verify(directory).await?
    } else {
        engine.publish(directory).await?
    };
    Ok(serde_json::to_value(&receipt)?)
}

pub async fn run_publish(args: &PublishArgs, engine: &SyncEngine) -> Result<u8> {
    print_json(&publish_report(args, engine).await?)?;
    Ok(0)
}

pub async fn refresh_report(args: &RefreshArgs, engine: &SyncEngine) -> Result<Value> {
    let assembler = JsonFileAssembler::new(&args.file);
    let outcome = engine.refresh_from(&assembler).await?;
    Ok(serde_json::to_value(&outcome)?)
}

pub async fn run_refresh(args: &RefreshArgs, engine: &SyncEngine) -> Result<u8> {
    print_json(&refresh_report(args, engine).await?)?;
    Ok(0)
}
