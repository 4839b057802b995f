//! Global CLI options and snapshot file handling.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use ent_scheduler::{SchedulerConfig, SchedulerState, config::DEFAULT_MAX_BATCH_SIZE};

/// Options shared by all commands; most can be set via env vars.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// JSON output envelope
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output (implies --json)
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Suppress notices
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Maximum operations released per resume (env: ENT_MAX_BATCH_SIZE)
    #[arg(
        long,
        global = true,
        env = "ENT_MAX_BATCH_SIZE",
        default_value_t = DEFAULT_MAX_BATCH_SIZE
    )]
    pub max_batch_size: usize,
}

impl GlobalOpts {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::default().with_max_batch_size(self.max_batch_size)
    }
}

fn is_cbor(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "cbor")
}

/// Load a snapshot; `.cbor` files use the binary form, everything else JSON.
/// A missing file is a fresh entity.
pub fn load_snapshot(path: &Path) -> Result<SchedulerState> {
    if !path.exists() {
        return Ok(SchedulerState::new());
    }
    let bytes = fs::read(path)
        .with_context(|| format!("read snapshot {}", path.display()))?;
    let state = if is_cbor(path) {
        SchedulerState::from_cbor(&bytes)
    } else {
        SchedulerState::from_json(&bytes)
    };
    state.with_context(|| format!("decode snapshot {}", path.display()))
}

pub fn write_snapshot(path: &Path, state: &SchedulerState) -> Result<()> {
    let bytes = if is_cbor(path) {
        state.to_cbor()?
    } else {
        state.to_json()?
    };
    fs::write(path, bytes).with_context(|| format!("write snapshot {}", path.display()))
}
