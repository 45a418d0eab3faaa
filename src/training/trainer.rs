//! Training loop implementation for the image GAN
//!
//! Each epoch performs one discriminator update on a combined batch of real
//! and synthetic images, followed by one generator update through the stacked
//! model with the discriminator frozen.

use std::path::{Path, PathBuf};

use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
    tensor::{backend::AutodiffBackend, ElementConversion, Tensor},
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::losses::{binary_accuracy, binary_cross_entropy, combined_labels, generator_loss};
use super::metrics::TrainingMetrics;
use crate::data::{images_to_tensor, ImageDataset};
use crate::error::{GanError, Result};
use crate::model::{latent_noise, Discriminator, Gan, Generator, StackedModel};
use crate::utils::{save_checkpoint, ModelConfig, Sampler};

/// Window used by the mode collapse heuristic
const COLLAPSE_WINDOW: usize = 10;

const OPTIMIZER_STATE_FILE: &str = "optimizer_state.json";

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Number of training epochs, one batch per epoch
    pub epochs: usize,
    /// Full batch size, half real and half synthetic for the discriminator
    pub batch_size: usize,
    /// Save a sample grid every N epochs (epoch 0 included)
    pub save_interval: usize,
    /// Number of images per sample grid
    pub samples: usize,
    /// Base Adam learning rate
    pub learning_rate: f64,
    /// Time-based learning rate decay
    pub decay: f64,
    pub beta_1: f32,
    pub beta_2: f32,
    pub epsilon: f32,
    /// Seed for batch selection and tensor initialization
    pub seed: Option<u64>,
    /// Directory sample grids are written to
    pub output_dir: PathBuf,
    /// File name prefix of sample grids
    pub file_prefix: String,
    /// Save checkpoint every N epochs
    pub checkpoint_every: Option<usize>,
    /// Directory to save checkpoints
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 20000,
            batch_size: 32,
            save_interval: 200,
            samples: 16,
            learning_rate: 2e-4,
            decay: 8e-9,
            beta_1: 0.9,
            beta_2: 0.999,
            epsilon: 1e-7,
            seed: None,
            output_dir: PathBuf::from("images"),
            file_prefix: "mnist".to_string(),
            checkpoint_every: None,
            checkpoint_dir: None,
        }
    }
}

impl TrainingConfig {
    /// Number of real (and synthetic) images in a discriminator batch
    pub fn half_batch(&self) -> usize {
        self.batch_size / 2
    }

    /// Adam configuration shared by both optimizers
    pub fn adam(&self) -> AdamConfig {
        AdamConfig::new()
            .with_beta_1(self.beta_1)
            .with_beta_2(self.beta_2)
            .with_epsilon(self.epsilon)
    }

    pub fn sampler(&self) -> Sampler {
        Sampler::new(self.samples, &self.output_dir, &self.file_prefix)
    }

    /// Seed for a run starting at `start_epoch`
    ///
    /// A resumed run draws different batches than the epochs it continues.
    pub fn epoch_seed(&self, start_epoch: usize) -> Option<u64> {
        self.seed.map(|seed| seed.wrapping_add(start_epoch as u64))
    }

    /// Reject settings the training loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size < 2 {
            return Err(GanError::Config(format!(
                "Batch size must be >= 2, got {}",
                self.batch_size
            )));
        }
        if self.save_interval == 0 {
            return Err(GanError::Config("Save interval must be > 0".to_string()));
        }
        if self.checkpoint_every == Some(0) {
            return Err(GanError::Config(
                "Checkpoint frequency must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Optimizer wrapper applying `lr / (1 + decay * t)` at step `t`
#[derive(Debug, Clone)]
pub struct DecayingOptimizer<O> {
    optimizer: O,
    learning_rate: f64,
    decay: f64,
    iterations: usize,
}

impl<O> DecayingOptimizer<O> {
    pub fn new(optimizer: O, learning_rate: f64, decay: f64) -> Self {
        Self {
            optimizer,
            learning_rate,
            decay,
            iterations: 0,
        }
    }

    /// Learning rate the next step will use
    pub fn current_lr(&self) -> f64 {
        self.learning_rate / (1.0 + self.decay * self.iterations as f64)
    }

    /// Number of steps taken so far
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Apply `grads` to `module` with the decayed learning rate
    pub fn step<B, M>(&mut self, module: M, grads: GradientsParams) -> M
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let lr = self.current_lr();
        self.iterations += 1;
        self.optimizer.step(lr, module, grads)
    }
}

/// Separate optimizer state for each network
pub struct GanOptimizers<OG, OD> {
    pub generator: DecayingOptimizer<OG>,
    pub discriminator: DecayingOptimizer<OD>,
}

/// Step counts of both optimizers, kept next to their records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct OptimizerSteps {
    generator: usize,
    discriminator: usize,
}

/// Whether `dir` holds optimizer state written by [`GanOptimizers::save`]
pub fn has_optimizer_state(dir: &Path) -> bool {
    dir.join(OPTIMIZER_STATE_FILE).exists()
}

impl<OG, OD> GanOptimizers<OG, OD> {
    /// Save the Adam moments and step counts of both optimizers into `dir`
    pub fn save<B>(&self, dir: &Path) -> Result<()>
    where
        B: AutodiffBackend,
        OG: Optimizer<Generator<B>, B>,
        OD: Optimizer<Discriminator<B>, B>,
    {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        Recorder::<B>::record(
            &recorder,
            self.generator.optimizer.to_record(),
            dir.join("generator_optim"),
        )
        .map_err(|e| GanError::Checkpoint(format!("saving generator optimizer: {:?}", e)))?;
        Recorder::<B>::record(
            &recorder,
            self.discriminator.optimizer.to_record(),
            dir.join("discriminator_optim"),
        )
        .map_err(|e| GanError::Checkpoint(format!("saving discriminator optimizer: {:?}", e)))?;

        let steps = OptimizerSteps {
            generator: self.generator.iterations,
            discriminator: self.discriminator.iterations,
        };
        std::fs::write(
            dir.join(OPTIMIZER_STATE_FILE),
            serde_json::to_string_pretty(&steps)?,
        )?;
        Ok(())
    }

    /// Restore state written by [`GanOptimizers::save`]
    pub fn load<B>(self, dir: &Path, device: &B::Device) -> Result<Self>
    where
        B: AutodiffBackend,
        OG: Optimizer<Generator<B>, B>,
        OD: Optimizer<Discriminator<B>, B>,
    {
        let content = std::fs::read_to_string(dir.join(OPTIMIZER_STATE_FILE))?;
        let steps: OptimizerSteps = serde_json::from_str(&content)?;

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let generator_record: <OG as Optimizer<Generator<B>, B>>::Record =
            Recorder::<B>::load(&recorder, dir.join("generator_optim"), device).map_err(|e| {
                GanError::Checkpoint(format!("loading generator optimizer: {:?}", e))
            })?;
        let discriminator_record: <OD as Optimizer<Discriminator<B>, B>>::Record =
            Recorder::<B>::load(&recorder, dir.join("discriminator_optim"), device).map_err(
                |e| GanError::Checkpoint(format!("loading discriminator optimizer: {:?}", e)),
            )?;

        let GanOptimizers {
            mut generator,
            mut discriminator,
        } = self;
        generator.optimizer = generator.optimizer.load_record(generator_record);
        generator.iterations = steps.generator;
        discriminator.optimizer = discriminator.optimizer.load_record(discriminator_record);
        discriminator.iterations = steps.discriminator;

        Ok(GanOptimizers {
            generator,
            discriminator,
        })
    }
}

/// Adam optimizers for both networks, configured from `config`
pub fn adam_optimizers<B: AutodiffBackend>(
    config: &TrainingConfig,
) -> GanOptimizers<impl Optimizer<Generator<B>, B>, impl Optimizer<Discriminator<B>, B>> {
    let adam = config.adam();
    GanOptimizers {
        generator: DecayingOptimizer::new(
            adam.init::<B, Generator<B>>(),
            config.learning_rate,
            config.decay,
        ),
        discriminator: DecayingOptimizer::new(
            adam.init::<B, Discriminator<B>>(),
            config.learning_rate,
            config.decay,
        ),
    }
}

/// Losses and accuracy of a single training step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMetrics {
    pub d_loss: f64,
    pub d_acc: f64,
    pub g_loss: f64,
}

/// One discriminator update on `real` images followed by as many synthetic ones
///
/// Synthetic images come from the generator in inference mode and carry no
/// graph, so only the discriminator receives gradients.
///
/// # Returns
///
/// The updated discriminator, its loss and its accuracy on the combined batch
pub fn discriminator_step<B, O>(
    generator: &Generator<B>,
    discriminator: Discriminator<B>,
    optimizer: &mut DecayingOptimizer<O>,
    real: Tensor<B, 4>,
    device: &B::Device,
) -> (Discriminator<B>, f64, f64)
where
    B: AutodiffBackend,
    O: Optimizer<Discriminator<B>, B>,
{
    let half = real.dims()[0];

    let noise = latent_noise::<B::InnerBackend>(half, generator.latent_dim(), device);
    let synthetic = Tensor::from_inner(generator.valid().forward(noise));

    let images = Tensor::cat(vec![real, synthetic], 0);
    let labels = combined_labels::<B>(half, device);

    let predictions = discriminator.forward(images);
    let loss = binary_cross_entropy(predictions.clone(), labels.clone());

    let predicted: Vec<f32> = predictions.into_data().iter::<f32>().collect();
    let targets: Vec<f32> = labels.into_data().iter::<f32>().collect();
    let accuracy = binary_accuracy(&predicted, &targets);
    let loss_value = loss.clone().into_scalar().elem::<f64>();

    let grads = GradientsParams::from_grads(loss.backward(), &discriminator);
    let discriminator = optimizer.step::<B, _>(discriminator, grads);

    (discriminator, loss_value, accuracy)
}

/// One generator update through the stacked model against all-ones labels
///
/// The discriminator is only read; its parameters are left as they are.
///
/// # Returns
///
/// The updated generator and its loss
pub fn generator_step<B, O>(
    generator: Generator<B>,
    discriminator: &Discriminator<B>,
    optimizer: &mut DecayingOptimizer<O>,
    batch_size: usize,
    device: &B::Device,
) -> (Generator<B>, f64)
where
    B: AutodiffBackend,
    O: Optimizer<Generator<B>, B>,
{
    let noise = latent_noise::<B>(batch_size, generator.latent_dim(), device);

    let loss = {
        let stacked = StackedModel::new(&generator, discriminator);
        generator_loss(stacked.forward(noise))
    };
    let loss_value = loss.clone().into_scalar().elem::<f64>();

    let grads = GradientsParams::from_grads(loss.backward(), &generator);
    let generator = optimizer.step::<B, _>(generator, grads);

    (generator, loss_value)
}

/// Run one full training step: discriminator update, then generator update
pub fn train_step<B, OG, OD, R>(
    config: &TrainingConfig,
    gan: Gan<B>,
    optimizers: &mut GanOptimizers<OG, OD>,
    dataset: &ImageDataset,
    rng: &mut R,
    device: &B::Device,
) -> Result<(Gan<B>, StepMetrics)>
where
    B: AutodiffBackend,
    OG: Optimizer<Generator<B>, B>,
    OD: Optimizer<Discriminator<B>, B>,
    R: Rng + ?Sized,
{
    let Gan {
        generator,
        discriminator,
    } = gan;

    let real = dataset.random_batch(config.half_batch(), rng)?;
    let real = images_to_tensor::<B>(&real, device);

    let (discriminator, d_loss, d_acc) = discriminator_step(
        &generator,
        discriminator,
        &mut optimizers.discriminator,
        real,
        device,
    );

    let (generator, g_loss) = generator_step(
        generator,
        &discriminator,
        &mut optimizers.generator,
        config.batch_size,
        device,
    );

    Ok((
        Gan {
            generator,
            discriminator,
        },
        StepMetrics {
            d_loss,
            d_acc,
            g_loss,
        },
    ))
}

/// GAN trainer
pub struct Trainer<B: AutodiffBackend> {
    config: TrainingConfig,
    model_config: ModelConfig,
    device: B::Device,
    metrics: TrainingMetrics,
    sampler: Sampler,
    optimizer_state: Option<PathBuf>,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create a new trainer
    ///
    /// `model_config` describes the trained networks and is stored with
    /// every checkpoint.
    pub fn new(config: TrainingConfig, model_config: ModelConfig, device: B::Device) -> Self {
        let sampler = config.sampler();
        Self {
            config,
            model_config,
            device,
            metrics: TrainingMetrics::new(),
            sampler,
            optimizer_state: None,
        }
    }

    /// Continue from previously recorded metrics
    pub fn with_metrics(mut self, metrics: TrainingMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Restore the optimizers from a checkpoint before training
    pub fn with_optimizer_state(mut self, checkpoint_dir: impl Into<PathBuf>) -> Self {
        self.optimizer_state = Some(checkpoint_dir.into());
        self
    }

    /// Train from epoch 0
    pub fn train(&mut self, gan: Gan<B>, dataset: &ImageDataset) -> Result<Gan<B>> {
        self.train_from(gan, dataset, 0)
    }

    /// Train epochs `start_epoch..epochs`
    ///
    /// # Arguments
    ///
    /// * `gan` - Models to train
    /// * `dataset` - Real images, at least half a batch
    /// * `start_epoch` - First epoch, non-zero when resuming
    ///
    /// # Returns
    ///
    /// The trained models
    pub fn train_from(
        &mut self,
        mut gan: Gan<B>,
        dataset: &ImageDataset,
        start_epoch: usize,
    ) -> Result<Gan<B>> {
        self.config.validate()?;

        let half = self.config.half_batch();
        if dataset.len() < half {
            return Err(GanError::InsufficientData {
                available: dataset.len(),
                required: half,
            });
        }

        let mut rng = match self.config.epoch_seed(start_epoch) {
            Some(seed) => {
                B::seed(seed);
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        };

        let mut optimizers = adam_optimizers::<B>(&self.config);
        if let Some(dir) = &self.optimizer_state {
            if has_optimizer_state(dir) {
                optimizers = optimizers.load::<B>(dir, &self.device)?;
                info!(
                    "Restored optimizer state from {} (step {})",
                    dir.display(),
                    optimizers.generator.iterations()
                );
            } else {
                warn!(
                    "No optimizer state in {}, starting from fresh Adam moments",
                    dir.display()
                );
            }
        }

        info!(
            "Starting training for {} epochs on {} images of shape {}",
            self.config.epochs.saturating_sub(start_epoch),
            dataset.len(),
            dataset.shape()
        );

        for epoch in start_epoch..self.config.epochs {
            let (trained, step) = train_step(
                &self.config,
                gan,
                &mut optimizers,
                dataset,
                &mut rng,
                &self.device,
            )?;
            gan = trained;

            self.metrics.record_epoch(step.g_loss, step.d_loss, step.d_acc);

            info!(
                "{} [D loss: {:.6}, acc.: {:.2}%] [G loss: {:.6}]",
                epoch,
                step.d_loss,
                100.0 * step.d_acc,
                step.g_loss
            );

            if epoch % self.config.save_interval == 0 {
                if self.metrics.check_mode_collapse(COLLAPSE_WINDOW) {
                    warn!("Possible mode collapse detected at epoch {}", epoch);
                }

                let path = self
                    .sampler
                    .save(&gan.generator.valid(), epoch, &self.device)?;
                debug!("Saved samples to {}", path.display());
            }

            if let (Some(every), Some(dir)) =
                (self.config.checkpoint_every, &self.config.checkpoint_dir)
            {
                if (epoch + 1) % every == 0 {
                    if let Err(e) = self.checkpoint(&gan, &optimizers, epoch + 1, dir) {
                        warn!("Failed to save checkpoint at epoch {}: {}", epoch + 1, e);
                    }
                }
            }
        }

        if let Some(dir) = &self.config.checkpoint_dir {
            self.checkpoint(&gan, &optimizers, self.config.epochs, dir)?;
        }

        let metrics_dir = self
            .config
            .checkpoint_dir
            .as_ref()
            .unwrap_or(&self.config.output_dir);
        std::fs::create_dir_all(metrics_dir)?;
        self.metrics
            .save_csv(&metrics_dir.join("training_metrics.csv"))?;

        info!("Training complete");
        Ok(gan)
    }

    /// Save models, metrics and optimizer state for `epoch` completed epochs
    fn checkpoint<OG, OD>(
        &self,
        gan: &Gan<B>,
        optimizers: &GanOptimizers<OG, OD>,
        epoch: usize,
        dir: &Path,
    ) -> Result<PathBuf>
    where
        OG: Optimizer<Generator<B>, B>,
        OD: Optimizer<Discriminator<B>, B>,
    {
        let path = save_checkpoint(gan, &self.model_config, &self.metrics, epoch, dir)?;
        optimizers.save::<B>(&path)?;
        Ok(path)
    }

    /// Get training metrics
    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    /// Get training configuration
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }
}
