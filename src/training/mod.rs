//! Training module for the image GAN
//!
//! This module provides:
//! - Training loop and single-step update functions
//! - Loss functions (Binary Cross Entropy) and label helpers
//! - Training configuration and metrics

mod losses;
mod metrics;
mod trainer;

pub use losses::{
    binary_accuracy, binary_cross_entropy, combined_label_values, combined_labels,
    generator_loss, REAL_LABEL, SYNTHETIC_LABEL,
};
pub use metrics::TrainingMetrics;
pub use trainer::{
    adam_optimizers, discriminator_step, generator_step, train_step, DecayingOptimizer,
    GanOptimizers, StepMetrics, Trainer, TrainingConfig,
};
