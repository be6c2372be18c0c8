//! Inspect a job journal

use anyhow::{Context, Result};
use clap::Parser;
use job_format::split_journal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(about = "Dump the records of a job journal")]
struct Args {
    /// Journal written by `sweep --journal`
    journal: PathBuf,

    /// Print only the first N records
    #[arg(long)]
    limit: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    println!("Loading {}...", args.journal.display());

    let bytes = std::fs::read(&args.journal)
        .with_context(|| format!("failed to read {}", args.journal.display()))?;
    let records = split_journal(&bytes).context("failed to parse journal")?;

    println!("\n=== Journal ===");
    println!("Records: {}", records.len());
    println!("Bytes: {}", bytes.len());

    for (i, record) in records.iter().take(args.limit.unwrap_or(usize::MAX)).enumerate() {
        let payload: serde_json::Value = record.decode()?;
        println!(
            "\n--- Record {} (v{}, created {}, {} bytes) ---",
            i, record.header.version, record.header.created_at_unix, record.header.payload_size_bytes
        );
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }

    Ok(())
}
