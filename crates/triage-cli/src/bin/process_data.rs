use anyhow::Result;
use clap::Parser;
use triage_cli::process::{run, ProcessArgs};

fn main() -> Result<()> {
    let args = ProcessArgs::parse();
    triage_core::init_tracing(args.json, triage_core::level_for(args.verbose));

    let summary = run(&args)?;
    println!(
        "Cleaned data saved to {} (table {}): {} rows, {} labels",
        args.database.display(),
        args.table,
        summary.rows,
        summary.labels
    );
    Ok(())
}
