// Command line driver for the swing extraction pipeline

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use uuid::Uuid;

use swingscore_lib::config::PipelineConfig;
use swingscore_lib::dataset::Dataset;
use swingscore_lib::logger::init_logger;
use swingscore_lib::pipeline::{load_stored_dataset, run_pipeline};
use swingscore_lib::scoring::{evaluate_models, LiveScorer, ScoringModel};

#[derive(Parser, Debug)]
#[command(name = "swingscore")]
#[command(about = "Extract per-swing features from badminton IMU sessions and score swings")]
struct Cli {
    /// Pipeline configuration file (TOML); built-in defaults when omitted
    #[arg(long, global = true, env = "SWINGSCORE_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run extraction and write the configured CSV, database and trace outputs
    Extract {
        /// Process subjects in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Fit the null model and the random forest, report held-out RMSE of both
    Evaluate {
        #[command(flatten)]
        source: DatasetSource,

        /// Write the fitted model to this JSON file
        #[arg(long)]
        save_model: Option<PathBuf>,
    },

    /// Score one reading: vx vy vz wx wy wz
    Score {
        #[command(flatten)]
        source: DatasetSource,

        /// Load a saved model instead of fitting one
        #[arg(long, conflicts_with = "from_db")]
        model: Option<PathBuf>,

        /// Six channel values, separated by spaces or commas
        #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
        values: Vec<String>,
    },

    /// Write the default configuration as TOML
    InitConfig {
        #[arg(default_value = "swingscore.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct DatasetSource {
    /// Use a stored run from the configured database instead of re-extracting
    #[arg(long)]
    from_db: bool,

    /// Stored run id (defaults to the latest complete run)
    #[arg(long, requires = "from_db")]
    run: Option<Uuid>,
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn load_dataset(config: &PipelineConfig, source: &DatasetSource) -> Result<Dataset> {
    if source.from_db {
        let database = config
            .output
            .database
            .as_deref()
            .context("--from-db requires output.database in the config")?;
        Ok(load_stored_dataset(database, source.run)?)
    } else {
        Ok(run_pipeline(config)?.report.dataset)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Extract { parallel } => {
            config.output.parallel |= parallel;
            let run = run_pipeline(&config).context("Extraction failed")?;

            println!(
                "Extracted {} swings from {} subjects ({} skipped)",
                run.dataset().len(),
                run.report.included.len(),
                run.report.skipped.len()
            );
            for skipped in &run.report.skipped {
                println!("- skipped {}: {}", skipped.subject_id, skipped.reason);
            }
            if let Some(run_id) = run.run_id {
                println!("Stored as run {}", run_id);
            }
        }
        Command::Evaluate { source, save_model } => {
            let dataset = load_dataset(&config, &source)?;
            let (model, report) =
                evaluate_models(&dataset, &config.evaluation).context("Model evaluation failed")?;

            println!(
                "Held-out RMSE per target ({} train / {} test rows, {} trees):",
                report.train_rows,
                report.test_rows,
                model.forest.trees().len()
            );
            for (column, null, forest) in report.per_target() {
                println!("- {}: null {:.2}, forest {:.2}", column, null, forest);
            }
            if let Some(path) = save_model {
                model
                    .save(&path)
                    .with_context(|| format!("Failed to save model {}", path.display()))?;
                println!("Model written to {}", path.display());
            }
        }
        Command::Score {
            source,
            model,
            values,
        } => {
            let model = match model {
                Some(path) => ScoringModel::load(&path)
                    .with_context(|| format!("Failed to load model {}", path.display()))?,
                None => {
                    let dataset = load_dataset(&config, &source)?;
                    evaluate_models(&dataset, &config.evaluation)
                        .context("Failed to fit scoring model")?
                        .0
                }
            };
            let scorer = LiveScorer::from_model(model, &config.labels);

            let reading = values.join(",");
            info!("Scoring reading [{}]", reading);
            let card = scorer.score_str(&reading);
            for (column, score) in card.entries() {
                println!("- {}: {}/{}", column, score, config.labels.max_score);
            }
        }
        Command::InitConfig { path, force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            PipelineConfig::default()
                .save_to_file(&path)
                .with_context(|| format!("Failed to write config {}", path.display()))?;
            println!("Default configuration written to {}", path.display());
        }
    }

    Ok(())
}
