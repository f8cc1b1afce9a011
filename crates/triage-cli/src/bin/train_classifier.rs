use anyhow::Result;
use clap::Parser;
use triage_cli::train::{run, TrainArgs};

fn main() -> Result<()> {
    let args = TrainArgs::parse();
    triage_core::init_tracing(args.json, triage_core::level_for(args.verbose));

    let outcome = run(&args)?;
    println!("{}", outcome.report);
    println!("Accuracy score: {}", outcome.report.accuracy);
    println!(
        "Trained model {} saved to {} (sha256 {})",
        outcome.model_id,
        args.model.display(),
        outcome.artifact.digest
    );
    Ok(())
}
