mod commands;
mod output;
mod opts;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::inspect::InspectArgs;
use commands::resume::ResumeArgs;
use opts::GlobalOpts;

#[derive(Parser, Debug)]
#[command(name = "ent", version, about = "Entity scheduler snapshot tool")]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize a snapshot file
    Inspect(InspectArgs),

    /// Feed messages into a snapshot and release ready operations
    Resume(ResumeArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.opts.verbose);

    match cli.command {
        Command::Inspect(args) => commands::inspect::cmd_inspect(&cli.opts, &args),
        Command::Resume(args) => commands::resume::cmd_resume(&cli.opts, &args),
    }
}

/// Log to stderr so stdout stays machine-readable. Also picks up `log` records
/// emitted by the scheduler library.
fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();
}
