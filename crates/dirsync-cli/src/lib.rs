//! # dirsync-cli: Command-line Node
//!
//! Provides the `dirsync` binary: a node that keeps a local copy of the
//! anchored directory and publishes new versions of it.
//!
//! ## Subcommands
//!
//! - `dirsync status` / `sync`: compare the cache with the anchor, catch up.
//! - `dirsync read <collection>` / `directory`: print anchored data.
//! - `dirsync publish <file> [--verify]` / `refresh <file>`: anchor a new version.
//! - `dirsync owner`: print the registry owner.
//! - `dirsync cache list`: list cached roots.
//! - `dirsync run <func_name>`: knowledge-base function names.
//!
//! ```bash
//! export REGISTRY_DEPLOYMENT_FILE=deployed-contract.json
//! dirsync -v sync
//! dirsync read servers
//! ETH_FROM=0xf39F... dirsync publish export.json --verify
//! ```
//!
//! Results go to stdout as pretty JSON; logs go to stderr.

pub mod cache;
pub mod config;
pub mod node;
pub mod publish;
pub mod retry;
pub mod run;
pub mod sync;

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

/// Write `value` to stdout as pretty JSON followed by a newline.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
