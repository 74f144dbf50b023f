//! Command-line interface for training and inspecting yield models.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use colored::*;

use crate::artifacts::ArtifactStore;
use crate::config::PipelineConfig;
use crate::pipeline::{PipelineRun, TrainingPipeline};
use crate::training::CVSummary;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "agriyield")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Crop yield model training and inspection")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full training pipeline and write artifacts
    Train {
        /// Input dataset (CSV); falls back to the standard data/ locations
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Directory that receives the model bundle and reports
        #[arg(short, long, default_value = "artifacts")]
        artifacts: PathBuf,

        /// Requested fold count for temporal and spatial cross-validation
        #[arg(long, default_value_t = 5)]
        cv_splits: usize,

        /// Seed for the holdout split, sensor backfill and the forests
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Fraction of rows held out for the final test split
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f64,
    },

    /// Summarize a saved model bundle and its training report
    Inspect {
        /// Artifact directory written by a previous train run
        #[arg(short, long, default_value = "artifacts")]
        artifacts: PathBuf,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Train {
            data,
            artifacts,
            cv_splits,
            seed,
            test_fraction,
        } => cmd_train(data, artifacts, cv_splits, seed, test_fraction),
        Commands::Inspect { artifacts } => cmd_inspect(&artifacts),
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

fn cmd_train(
    data: Option<PathBuf>,
    artifacts: PathBuf,
    cv_splits: usize,
    seed: u64,
    test_fraction: f64,
) -> anyhow::Result<()> {
    let mut config = PipelineConfig::new()
        .with_artifacts_dir(artifacts)
        .with_cv_splits(cv_splits)
        .with_seed(seed)
        .with_test_fraction(test_fraction);
    if let Some(path) = data {
        config = config.with_data_path(path);
    }

    section("Train");
    let start = Instant::now();
    let run = TrainingPipeline::new(config).run()?;
    println!("  {} finished in {:.2?}", ok("✓"), start.elapsed());

    print_run_summary(&run);
    Ok(())
}

fn cmd_inspect(artifacts: &Path) -> anyhow::Result<()> {
    let store = ArtifactStore::new(artifacts);
    let bundle = store.load_bundle()?;
    let report = store.load_report()?;

    section("Model");
    println!("  {:<24} {}", muted("Type"), report.model_type.white());
    println!("  {:<24} {}", muted("Version"), report.model_version.white());
    println!("  {:<24} {}", muted("Trained at"), report.trained_at.white());
    println!("  {:<24} {}", muted("Trees"), bundle.model.n_trees());
    println!("  {:<24} {}", muted("Features"), report.n_features);
    println!(
        "  {:<24} {}",
        muted("Samples"),
        format!(
            "{} train / {} test",
            report.train_samples, report.test_samples
        )
    );

    section("Holdout metrics");
    println!("  {:<24} {:>10.4}", muted("R²"), report.r2);
    println!("  {:<24} {:>10.2}", muted("MAE"), report.mae);
    println!("  {:<24} {:>10.2}", muted("RMSE"), report.rmse);
    println!("  {:<24} {:>9.2}%", muted("MAPE"), report.mape);
    if let Some(oob) = report.oob_score {
        println!("  {:<24} {:>10.4}", muted("OOB R²"), oob);
    }

    section("Cross-validation");
    println!(
        "  {:<24} {:.4} ± {:.4} {}",
        muted("Temporal R²"),
        report.temporal_cv_r2_mean,
        report.temporal_cv_r2_std,
        dim(&format!("({} folds)", report.temporal_cv_folds))
    );
    println!(
        "  {:<24} {:.4} ± {:.4} {}",
        muted("Spatial R²"),
        report.spatial_cv_r2_mean,
        report.spatial_cv_r2_std,
        dim(&format!("({} folds)", report.spatial_cv_folds))
    );

    section("Feature importance");
    for (name, weight) in report.top_features(10) {
        println!("  {:<24} {:>10.4}", muted(&name), weight);
    }

    println!();
    Ok(())
}

// ─── Run summary ───────────────────────────────────────────────────────────────

fn print_run_summary(run: &PipelineRun) {
    section("Data");
    println!(
        "  {:<24} {}",
        muted("Source"),
        accent(&run.data_path.display().to_string())
    );
    println!("  {:<24} {}", muted("Rows loaded"), run.rows_loaded);
    println!(
        "  {:<24} {} {}",
        muted("Rows retained"),
        run.outlier.rows_retained,
        dim(&format!("({} outliers removed)", run.outlier.rows_removed))
    );
    if run.outlier.conversion_factor != 1.0 {
        println!(
            "  {:<24} ×{}",
            muted("Yield unit rescale"),
            run.outlier.conversion_factor
        );
    }
    if !run.engineering.synthesized.is_empty() {
        println!(
            "  {:<24} {}",
            muted("Backfilled"),
            run.engineering.synthesized.join(", ")
        );
    }
    if !run.engineering.derived.is_empty() {
        println!(
            "  {:<24} {}",
            muted("Derived"),
            run.engineering.derived.join(", ")
        );
    }
    let cardinalities: Vec<String> = run
        .encoder_cardinalities
        .iter()
        .map(|(column, n)| format!("{} {}", column, n))
        .collect();
    println!(
        "  {:<24} {}",
        muted("Categories"),
        dim(&cardinalities.join(", "))
    );

    section("Cross-validation");
    print_cv_line("Temporal R²", &run.temporal_cv);
    print_cv_line("Spatial R²", &run.spatial_cv);

    section("Model");
    println!("  {:<24} {:>10.4}", muted("Holdout R²"), run.report.r2);
    println!("  {:<24} {:>10.2}", muted("MAE"), run.report.mae);
    println!("  {:<24} {:>10.2}", muted("RMSE"), run.report.rmse);
    println!("  {:<24} {:>9.2}%", muted("MAPE"), run.report.mape);
    if let Some(oob) = run.report.oob_score {
        println!("  {:<24} {:>10.4}", muted("OOB R²"), oob);
    }

    section("Baselines");
    println!(
        "  {:<24} {:>10} {:>12}",
        muted("Model"),
        muted("R²"),
        muted("RMSE")
    );
    println!("  {}", dim(&"─".repeat(48)));
    for baseline in &run.report.baseline_comparison {
        println!(
            "  {:<24} {:>10.4} {:>12.2}",
            baseline.model, baseline.r2, baseline.rmse
        );
    }
    println!(
        "  {:<24} {:>10.4} {:>12.2}",
        "random_forest".white().bold(),
        run.report.r2,
        run.report.rmse
    );

    section("Feature importance");
    for (name, weight) in run.report.top_features(10) {
        println!("  {:<24} {:>10.4}", muted(&name), weight);
    }

    section("Artifacts");
    println!("  {} {}", ok("✓"), run.artifacts.model.display());
    println!("  {} {}", ok("✓"), run.artifacts.metrics.display());
    println!("  {} {}", ok("✓"), run.artifacts.feature_importance.display());
    println!();
}

fn print_cv_line(name: &str, summary: &CVSummary) {
    match (summary.r2_mean, summary.r2_std) {
        (Some(mean), Some(std)) => println!(
            "  {:<24} {} {}",
            muted(name),
            format!("{:.4} ± {:.4}", mean, std).white(),
            dim(&format!("({} folds)", summary.folds.len()))
        ),
        _ => println!("  {:<24} {}", muted(name), dim("skipped, not enough groups")),
    }
}
