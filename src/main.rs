//! trainkit CLI
//!
//! Command-line access to the run helpers: create a log directory, draw the
//! long-distance prediction accuracy chart, and look inside checkpoints.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use trainkit::training::checkpoint::{checkpoint_dir, Checkpoint, CheckpointName};
use trainkit::utils::logging::setup_cli_logging;
use trainkit::utils::{format_bytes, format_number};
use trainkit::{
    plot_long_distance_prediction_accuracy, CheckpointStore, LogDirBuilder, NameToken, PlotData,
    RunConfig,
};

/// Log directory, checkpoint and chart helpers for training runs
#[derive(Parser, Debug)]
#[command(name = "trainkit")]
#[command(version)]
#[command(about = "Log directory, checkpoint and chart helpers for training runs", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// TOML file with naming rules (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a timestamped log directory and print its path
    LogDir {
        /// Run label, e.g. baseline_lstm
        label: String,

        /// Learning rate to embed in the directory name, spelled as given (e.g. 3e-4)
        #[arg(short, long)]
        learning_rate: Option<String>,

        /// Root directory (overrides the config file)
        #[arg(short, long)]
        root_dir: Option<PathBuf>,
    },

    /// Draw the long-distance prediction accuracy chart
    Plot {
        /// JSON file with `distances` and `accuracies` arrays
        #[arg(short, long, conflicts_with_all = ["distances", "accuracies"])]
        data: Option<PathBuf>,

        /// Comma-separated distances
        #[arg(long, value_delimiter = ',', requires = "accuracies")]
        distances: Vec<f64>,

        /// Comma-separated accuracies
        #[arg(long, value_delimiter = ',', requires = "distances")]
        accuracies: Vec<f64>,

        /// Output image (.svg, or .png when the extension is png or missing)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show the epoch, loss and state sizes of a checkpoint file
    Inspect {
        /// Checkpoint file (.pth)
        checkpoint: PathBuf,
    },

    /// List the checkpoints of a log directory
    List {
        /// Log directory containing `checkpoints/`
        log_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_cli_logging(cli.verbose)?;

    let config = match &cli.config {
        Some(path) => RunConfig::from_toml_file(path)?,
        None => RunConfig::default(),
    };

    match cli.command {
        Commands::LogDir {
            label,
            learning_rate,
            root_dir,
        } => cmd_log_dir(&config, &label, learning_rate, root_dir),
        Commands::Plot {
            data,
            distances,
            accuracies,
            output,
        } => cmd_plot(data.as_deref(), distances, accuracies, &output),
        Commands::Inspect { checkpoint } => cmd_inspect(&checkpoint),
        Commands::List { log_dir } => cmd_list(&config, &log_dir),
    }
}

fn cmd_log_dir(
    config: &RunConfig,
    label: &str,
    learning_rate: Option<String>,
    root_dir: Option<PathBuf>,
) -> Result<()> {
    if let Some(lr) = &learning_rate {
        if NameToken::from(lr.as_str()).value().is_none() {
            bail!("Learning rate must be a number, got {:?}", lr);
        }
    }

    let mut builder = LogDirBuilder::from_config(config);
    if let Some(root_dir) = root_dir {
        builder = LogDirBuilder::new(root_dir).embed_learning_rate(config.embed_learning_rate_in_path);
    }

    let dir = builder.create(label, learning_rate.map(NameToken::from))?;
    if dir.as_os_str().is_empty() {
        info!("Empty label, no log directory created");
        return Ok(());
    }

    println!("{}", dir.display());
    Ok(())
}

fn cmd_plot(
    data: Option<&Path>,
    distances: Vec<f64>,
    accuracies: Vec<f64>,
    output: &Path,
) -> Result<()> {
    let plot_data = match data {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read plot data {}", path.display()))?;
            serde_json::from_str::<PlotData>(&content)
                .with_context(|| format!("Failed to parse plot data {}", path.display()))?
        }
        None => PlotData::new(distances, accuracies),
    };

    plot_long_distance_prediction_accuracy(&plot_data, output)?;

    println!(
        "  {} {} points -> {}",
        "✓".green(),
        format_number(plot_data.distances.len()),
        output.display()
    );
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let checkpoint = Checkpoint::read(path)?;

    let kind = path
        .file_name()
        .and_then(|s| s.to_str())
        .and_then(CheckpointName::parse)
        .map(|name| if name.is_best() { "best" } else { "regular" })
        .unwrap_or("unnamed");

    println!("{}", path.display().to_string().cyan().bold());
    println!("  Kind:            {}", kind);
    println!("  Epoch:           {}", checkpoint.epoch);
    println!("  Loss:            {:.6}", checkpoint.loss);
    println!(
        "  Model state:     {}",
        format_bytes(checkpoint.model_state_dict.len())
    );
    println!(
        "  Optimizer state: {}",
        format_bytes(checkpoint.optimizer_state_dict.len())
    );
    Ok(())
}

fn cmd_list(config: &RunConfig, log_dir: &Path) -> Result<()> {
    let store = CheckpointStore::from_config(config);
    let checkpoints = store.list(log_dir)?;

    if checkpoints.is_empty() {
        println!(
            "No checkpoints in {}",
            checkpoint_dir(log_dir).display()
        );
        return Ok(());
    }

    for (path, name) in &checkpoints {
        let label = match name {
            CheckpointName::Regular { epoch, .. } => format!("epoch {}", epoch),
            CheckpointName::Best { metric, score } => match score {
                Some(score) => format!("best {} ({})", metric, score),
                None => format!("best {}", metric),
            },
        };
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        if name.is_best() {
            println!("  {:<32} {}", file_name.green(), label);
        } else {
            println!("  {:<32} {}", file_name, label);
        }
    }

    Ok(())
}
