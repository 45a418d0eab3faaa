//! Image GAN training program
//!
//! Main entry point providing CLI interface for:
//! - Training the GAN on a directory of images or a pickle archive
//! - Rendering sample grids from a checkpoint
//! - Writing a default configuration file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::backend::{Autodiff, NdArray};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rust_image_gan::{
    data::DataSource,
    model::Gan,
    training::Trainer,
    utils::{find_latest_checkpoint, load_checkpoint, Config, Sampler},
};

type InferenceBackend = NdArray<f32>;
type TrainingBackend = Autodiff<InferenceBackend>;

/// Train a GAN that synthesizes images
#[derive(Parser)]
#[command(name = "image_gan")]
#[command(version = "0.1.0")]
#[command(about = "Train a generative adversarial network on small images")]
struct Cli {
    /// Path to configuration file (defaults are used when it does not exist)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the GAN
    Train {
        /// Directory of training images
        #[arg(long, conflicts_with = "pickle")]
        data_dir: Option<PathBuf>,

        /// Gzip pickle archive of ((x_train, y_train), (x_test, y_test))
        #[arg(long)]
        pickle: Option<PathBuf>,

        /// Number of epochs
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Batch size (even)
        #[arg(short, long)]
        batch: Option<usize>,

        /// Save a sample grid every N epochs
        #[arg(short, long)]
        save_interval: Option<usize>,

        /// Resume from a checkpoint, or the latest one in a checkpoint directory
        #[arg(long)]
        resume: Option<PathBuf>,
    },

    /// Render a sample grid from a checkpoint
    Sample {
        /// Checkpoint directory
        #[arg(long)]
        checkpoint: PathBuf,

        /// Number of images in the grid
        #[arg(short, long, default_value = "16")]
        samples: usize,

        /// Output PNG path
        #[arg(short, long, default_value = "samples.png")]
        output: PathBuf,
    },

    /// Initialize default configuration file
    Init {
        /// Output configuration file path (.json or .toml)
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = match cli.verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Train {
            data_dir,
            pickle,
            epochs,
            batch,
            save_interval,
            resume,
        } => {
            let mut config = Config::load_or_default(&cli.config)
                .with_context(|| format!("reading config {}", cli.config.display()))?;

            if let Some(dir) = data_dir {
                config.data.source = DataSource::Directory(dir);
            }
            if let Some(path) = pickle {
                config.data.source = DataSource::PickleArchive(path);
            }
            if let Some(epochs) = epochs {
                config.training.epochs = epochs;
            }
            if let Some(batch) = batch {
                config.training.batch_size = batch;
            }
            if let Some(interval) = save_interval {
                config.training.save_interval = interval;
            }

            train(&config, resume.as_deref())?;
        }
        Commands::Sample {
            checkpoint,
            samples,
            output,
        } => {
            sample(&checkpoint, samples, &output)?;
        }
        Commands::Init { output } => {
            init_config(&output)?;
        }
    }

    Ok(())
}

/// Train the GAN, optionally resuming from a checkpoint
fn train(config: &Config, resume: Option<&Path>) -> Result<()> {
    config.validate()?;

    let device = Default::default();
    let source = &config.data.source;

    let dataset = source
        .load(config.image_shape())
        .with_context(|| format!("loading {}", source.path().display()))?;

    let training_config = config.training_config();

    let (gan, mut trainer, start_epoch) = match resume {
        Some(path) => {
            let checkpoint = if path.join("meta.json").exists() {
                path.to_path_buf()
            } else {
                find_latest_checkpoint(path)
                    .with_context(|| format!("no checkpoint found in {}", path.display()))?
            };

            let (gan, meta, metrics) = load_checkpoint::<TrainingBackend>(&checkpoint, &device)
                .with_context(|| format!("loading checkpoint {}", checkpoint.display()))?;
            if meta.model.image_shape() != dataset.shape() {
                anyhow::bail!(
                    "checkpoint was trained on {} images, dataset has {}",
                    meta.model.image_shape(),
                    dataset.shape()
                );
            }
            info!("Resuming from epoch {}", meta.epoch);

            let trainer = Trainer::new(training_config, meta.model, device)
                .with_metrics(metrics)
                .with_optimizer_state(&checkpoint);
            (gan, trainer, meta.epoch)
        }
        None => {
            let gan = Gan::<TrainingBackend>::new(
                &device,
                &config.generator_config(),
                &config.discriminator_config(),
            );
            let trainer = Trainer::new(training_config, config.model.clone(), device);
            (gan, trainer, 0)
        }
    };

    trainer.train_from(gan, &dataset, start_epoch)?;

    let metrics = trainer.metrics();
    if let (Some(g_loss), Some(d_loss), Some(d_acc)) = (
        metrics.latest_gen_loss(),
        metrics.latest_disc_loss(),
        metrics.latest_disc_accuracy(),
    ) {
        info!(
            "Final losses: generator {:.4}, discriminator {:.4} (acc. {:.2}%)",
            g_loss,
            d_loss,
            100.0 * d_acc
        );
    }

    Ok(())
}

/// Render a sample grid from a checkpoint
fn sample(checkpoint: &Path, samples: usize, output: &Path) -> Result<()> {
    let device = Default::default();

    let (gan, meta, _) = load_checkpoint::<InferenceBackend>(checkpoint, &device)
        .with_context(|| format!("loading checkpoint {}", checkpoint.display()))?;
    info!("Loaded generator trained for {} epochs", meta.epoch);

    let sampler = Sampler {
        samples,
        ..Default::default()
    };
    sampler.save_to(&gan.generator, output, &device)?;

    info!("Saved {} samples to {}", samples, output.display());
    Ok(())
}

/// Initialize default configuration file
fn init_config(output: &Path) -> Result<()> {
    let config = Config::default();
    config.save(output)?;
    info!("Created default configuration at {}", output.display());
    Ok(())
}
