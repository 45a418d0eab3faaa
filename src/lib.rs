//! # Image GAN
//!
//! This crate trains a fully-connected Generative Adversarial Network that
//! synthesizes small images from a dataset of real ones.
//!
//! ## Modules
//!
//! - `data`: Image loading (directories, gzip pickle archives) and rescaling
//! - `model`: GAN architecture (Generator, Discriminator, stacked model)
//! - `training`: Training loop, loss functions and metrics
//! - `utils`: Configuration, checkpoints and sample grids
//! - `error`: Library error type

pub mod data;
pub mod error;
pub mod model;
pub mod training;
pub mod utils;

pub use data::{DataSource, ImageDataset, ImageShape};
pub use error::{GanError, Result};
pub use model::{Discriminator, Gan, Generator, StackedModel};
pub use training::{train_step, StepMetrics, Trainer, TrainingConfig, TrainingMetrics};
pub use utils::{load_checkpoint, save_checkpoint, Config, Sampler};
