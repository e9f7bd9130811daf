//! # Run Subcommand
//!
//! Addresses the engine by knowledge-base function name (`init`,
//! `update_from_hub`, `get_directory`, `get_<collection>`) and prints the
//! `{"status": "success", "message": ...}` envelope.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;

use dirsync_engine::{KbOperation, KbResponse, SyncEngine};

use crate::print_json;
use crate::retry::retry_with_backoff;

/// Arguments for `dirsync run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Function name, e.g. `get_servers`.
    pub func_name: String,

    /// Directory export `update_from_hub` assembles from.
    #[arg(long)]
    pub input: Option<PathBuf>,
}

impl RunArgs {
    /// Parse the function name and check that `update_from_hub` has an input.
    pub fn operation(&self) -> Result<KbOperation> {
        let op: KbOperation = self.func_name.parse()?;
        if op == KbOperation::UpdateFromHub && self.input.is_none() {
            bail!("update_from_hub requires --input <FILE>");
        }
        Ok(op)
    }
}

pub async fn run_response(op: KbOperation, engine: &SyncEngine, retries: u32) -> Result<KbResponse> {
    let response = match op {
        // Publishing is not repeated; see the `publish` subcommand.
        KbOperation::UpdateFromHub => engine.run(op).await?,
        _ => retry_with_backoff(retries, "run", || engine.run(op)).await?,
    };
    Ok(response)
}

pub async fn run_operation(op: KbOperation, engine: &SyncEngine, retries: u32) -> Result<u8> {
    print_json(&run_response(op, engine, retries).await?)?;
    Ok(0)
}
