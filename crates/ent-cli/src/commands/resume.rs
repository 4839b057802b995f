//! `ent resume` command.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ent_scheduler::{EntityMessage, EntityScheduler};
use serde_json::json;

use crate::opts::{GlobalOpts, load_snapshot, write_snapshot};
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Snapshot file; created if missing
    pub snapshot: PathBuf,

    /// JSON array of inbound messages
    #[arg(long)]
    pub messages: Option<PathBuf>,

    /// Current time in nanoseconds since the epoch
    #[arg(long)]
    pub now_ns: u64,

    /// Write the updated snapshot here instead of in place
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn cmd_resume(opts: &GlobalOpts, args: &ResumeArgs) -> Result<()> {
    let mut state = load_snapshot(&args.snapshot)?;
    let incoming: Vec<EntityMessage> = match &args.messages {
        Some(path) => {
            let bytes = fs::read(path)
                .with_context(|| format!("read messages {}", path.display()))?;
            serde_json::from_slice(&bytes)
                .with_context(|| format!("decode messages {}", path.display()))?
        }
        None => Vec::new(),
    };

    let scheduler: EntityScheduler = EntityScheduler::new(opts.scheduler_config());
    let outcome = scheduler.resume(&mut state, incoming, args.now_ns)?;
    tracing::info!(ready = outcome.ready.len(), "resumed {state}");

    let target = args.out.as_ref().unwrap_or(&args.snapshot);
    write_snapshot(target, &state)?;

    let mut warnings = Vec::new();
    if outcome.duplicates > 0 {
        warnings.push(format!(
            "discarded {} duplicate request(s)",
            outcome.duplicates
        ));
    }
    if outcome.releases_ignored > 0 {
        warnings.push(format!("ignored {} release(s)", outcome.releases_ignored));
    }
    let data = json!({
        "ready": outcome.ready,
        "lock_granted": outcome.lock_granted,
        "next_due_ns": outcome.next_due_ns,
        "buffered": outcome.buffered,
        "snapshot": target.display().to_string(),
        "summary": state.to_string(),
    });
    print_success(opts, data, warnings)
}
