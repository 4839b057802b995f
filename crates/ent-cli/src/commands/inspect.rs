//! `ent inspect` command.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;

use crate::opts::{GlobalOpts, load_snapshot};
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Snapshot file (`.cbor` for binary, JSON otherwise)
    pub snapshot: PathBuf,
}

pub fn cmd_inspect(opts: &GlobalOpts, args: &InspectArgs) -> Result<()> {
    if !args.snapshot.exists() {
        bail!("snapshot {} not found", args.snapshot.display());
    }
    let state = load_snapshot(&args.snapshot)?;
    let summary = state.summary()?;

    let mut warnings = Vec::new();
    if summary.is_empty {
        warnings.push("entity is empty and can be discarded".to_string());
    }
    if opts.json || opts.pretty {
        print_success(opts, serde_json::to_value(&summary)?, warnings)
    } else {
        let mut data = serde_json::to_value(&summary)?;
        data["summary"] = state.to_string().into();
        print_success(opts, data, warnings)
    }
}
