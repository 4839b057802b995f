//! Human and JSON output.
//!
//! Human mode prints primary data to stdout and notices to stderr. JSON mode
//! wraps responses in `{ data, warnings? }` and respects `--pretty` and
//! `--quiet`.

use std::io::Write;

use anyhow::Result;
use serde_json::{Value, json};

use crate::opts::GlobalOpts;

pub fn print_success(opts: &GlobalOpts, data: Value, mut warnings: Vec<String>) -> Result<()> {
    if opts.quiet {
        warnings.clear();
    }
    if opts.pretty || opts.json {
        print_json(opts, data, warnings)
    } else {
        print_human(data, warnings)
    }
}

fn print_json(opts: &GlobalOpts, data: Value, warnings: Vec<String>) -> Result<()> {
    let mut root = json!({ "data": data });
    if !warnings.is_empty() {
        root["warnings"] = warnings.into_iter().map(Value::String).collect();
    }
    if opts.pretty {
        println!("{}", serde_json::to_string_pretty(&root)?);
    } else {
        println!("{}", serde_json::to_string(&root)?);
    }
    Ok(())
}

fn print_human(data: Value, warnings: Vec<String>) -> Result<()> {
    let mut stderr = std::io::stderr();
    for w in warnings {
        writeln!(stderr, "notice: {w}")?;
    }
    match data {
        Value::String(s) => println!("{s}"),
        Value::Object(map) => {
            for (key, value) in map {
                match value {
                    Value::String(s) => println!("{key}: {s}"),
                    other => println!("{key}: {other}"),
                }
            }
        }
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    Ok(())
}
