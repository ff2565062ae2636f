// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap, builds the RunConfig and hands it to a Layer 2 use case.
// Final results are printed here; progress goes through tracing.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{AverageArgs, Commands, EvaluateArgs, ExportArgs, TrainArgs};

use crate::application::{
    average_use_case::AverageUseCase, evaluate_use_case::EvaluateUseCase,
    export_use_case::ExportUseCase, train_use_case::TrainUseCase,
};

#[derive(Parser, Debug)]
#[command(
    name = "mtl-tagger",
    version,
    about = "Multi-task sequence labelling on a shared transformer encoder."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
            Commands::Average(args)  => run_average(args),
            Commands::Export(args)   => run_export(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let cfg = args.into_config()?;
    tracing::info!("Training {} tasks into '{}'", cfg.tasks.len(), cfg.model_dir);

    let summary = TrainUseCase::new(cfg).execute()?;
    println!(
        "Training complete: {} steps, final loss {:.4}, {} checkpoints.",
        summary.steps, summary.final_loss, summary.checkpoints.len(),
    );
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let cfg = args.common.resolve(true)?;
    let checkpoints = EvaluateUseCase::new(cfg).execute()?;

    for ckpt in &checkpoints {
        println!("{}\t{:.4}", ckpt.path.display(), ckpt.macro_accuracy);
    }
    if let Some(best) = checkpoints.iter().max_by(|a, b| a.macro_accuracy.total_cmp(&b.macro_accuracy)) {
        println!("Best: {} ({:.4})", best.path.display(), best.macro_accuracy);
    }
    Ok(())
}

fn run_average(args: AverageArgs) -> Result<()> {
    let cfg = args.into_config()?;
    let report = AverageUseCase::new(cfg).execute()?;

    println!("Averaged {} checkpoints:", report.selected.len());
    for ckpt in &report.selected {
        println!("  {} ({:.4})", ckpt.path.display(), ckpt.macro_accuracy);
    }
    println!("Saved to '{}', exported to '{}'.", report.averaged_dir.display(), report.export_dir.display());
    println!("Dev macro accuracy of the averaged model: {:.4}", report.macro_accuracy);
    Ok(())
}

fn run_export(args: ExportArgs) -> Result<()> {
    let (cfg, source, target) = args.resolve()?;
    ExportUseCase::new(cfg, source.clone(), target.clone()).execute()?;
    println!("Exported '{}' to '{}'.", source.display(), target.display());
    Ok(())
}
