//! Checkpoint save/load utilities
//!
//! A checkpoint is a `checkpoint_epoch_NNNN` directory holding the generator
//! and discriminator records, a `meta.json` and the metrics recorded so far.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use burn::tensor::backend::Backend;

use super::config::ModelConfig;
use crate::error::{GanError, Result};
use crate::model::Gan;
use crate::training::TrainingMetrics;

const CHECKPOINT_PREFIX: &str = "checkpoint_epoch_";

/// Checkpoint metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Number of completed epochs
    pub epoch: usize,
    /// Generator loss at checkpoint
    pub gen_loss: f64,
    /// Discriminator loss at checkpoint
    pub disc_loss: f64,
    /// Timestamp of checkpoint
    pub timestamp: String,
    /// Topology of the saved networks
    pub model: ModelConfig,
}

/// Save a complete checkpoint (models + metadata + metrics)
///
/// # Arguments
///
/// * `gan` - Models to save
/// * `model_config` - Topology used to rebuild the models on load
/// * `metrics` - Training metrics
/// * `epoch` - Number of completed epochs
/// * `dir` - Directory holding all checkpoints
///
/// # Returns
///
/// Path to saved checkpoint
pub fn save_checkpoint<B: Backend>(
    gan: &Gan<B>,
    model_config: &ModelConfig,
    metrics: &TrainingMetrics,
    epoch: usize,
    dir: &Path,
) -> Result<PathBuf> {
    let checkpoint_dir = dir.join(format!("{}{:04}", CHECKPOINT_PREFIX, epoch));
    std::fs::create_dir_all(&checkpoint_dir)?;

    gan.save(&checkpoint_dir)?;

    let meta = CheckpointMeta {
        epoch,
        gen_loss: metrics.latest_gen_loss().unwrap_or(0.0),
        disc_loss: metrics.latest_disc_loss().unwrap_or(0.0),
        timestamp: chrono::Utc::now().to_rfc3339(),
        model: model_config.clone(),
    };
    let meta_json = serde_json::to_string_pretty(&meta)?;
    std::fs::write(checkpoint_dir.join("meta.json"), meta_json)?;

    metrics.save_csv(&checkpoint_dir.join("metrics.csv"))?;

    tracing::info!("Saved checkpoint to {}", checkpoint_dir.display());
    Ok(checkpoint_dir)
}

/// Load checkpoint metadata
pub fn load_checkpoint_meta(checkpoint_dir: &Path) -> Result<CheckpointMeta> {
    let content = std::fs::read_to_string(checkpoint_dir.join("meta.json"))?;
    let meta: CheckpointMeta = serde_json::from_str(&content)?;
    Ok(meta)
}

/// Load a complete checkpoint
///
/// The networks are rebuilt from the stored [`ModelConfig`] before their
/// records are loaded.
///
/// # Returns
///
/// Tuple of (models, metadata, metrics)
pub fn load_checkpoint<B: Backend>(
    checkpoint_dir: &Path,
    device: &B::Device,
) -> Result<(Gan<B>, CheckpointMeta, TrainingMetrics)> {
    if !checkpoint_dir.is_dir() {
        return Err(GanError::Checkpoint(format!(
            "{} is not a checkpoint directory",
            checkpoint_dir.display()
        )));
    }

    let meta = load_checkpoint_meta(checkpoint_dir)?;
    let gan = Gan::new(
        device,
        &meta.model.generator_config(),
        &meta.model.discriminator_config(),
    )
    .load(checkpoint_dir, device)?;

    let metrics_path = checkpoint_dir.join("metrics.csv");
    let metrics = if metrics_path.exists() {
        TrainingMetrics::load_csv(&metrics_path)?
    } else {
        TrainingMetrics::new()
    };

    tracing::info!(
        "Loaded checkpoint from {} (epoch {})",
        checkpoint_dir.display(),
        meta.epoch
    );
    Ok((gan, meta, metrics))
}

fn checkpoint_dirs(dir: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(dir)
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| n.starts_with(CHECKPOINT_PREFIX))
                .unwrap_or(false)
        })
        .map(|e| e.path())
        .collect();

    dirs.sort();
    dirs
}

/// Find the latest checkpoint in a directory
pub fn find_latest_checkpoint(dir: &Path) -> Option<PathBuf> {
    checkpoint_dirs(dir).pop()
}

/// List all checkpoints in a directory, oldest first
pub fn list_checkpoints(dir: &Path) -> Vec<(PathBuf, CheckpointMeta)> {
    checkpoint_dirs(dir)
        .into_iter()
        .filter_map(|path| load_checkpoint_meta(&path).ok().map(|meta| (path, meta)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::latent_noise;
    use burn::backend::NdArray;
    use tempfile::tempdir;

    type TestBackend = NdArray<f32>;

    fn small_model_config() -> ModelConfig {
        ModelConfig {
            width: 2,
            height: 3,
            channels: 1,
            latent_dim: 4,
            hidden_sizes: vec![8],
            ..Default::default()
        }
    }

    fn small_gan(config: &ModelConfig) -> Gan<TestBackend> {
        Gan::new(
            &Default::default(),
            &config.generator_config(),
            &config.discriminator_config(),
        )
    }

    #[test]
    fn test_checkpoint_meta_serialization() {
        let meta = CheckpointMeta {
            epoch: 10,
            gen_loss: 0.5,
            disc_loss: 0.6,
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            model: ModelConfig::default(),
        };

        let json = serde_json::to_string(&meta).unwrap();
        let loaded: CheckpointMeta = serde_json::from_str(&json).unwrap();

        assert_eq!(meta, loaded);
    }

    #[test]
    fn test_save_and_load_checkpoint() {
        let dir = tempdir().unwrap();
        let device = Default::default();
        let config = small_model_config();
        let gan = small_gan(&config);

        let mut metrics = TrainingMetrics::new();
        metrics.record_epoch(1.5, 0.6, 0.75);

        let path = save_checkpoint(&gan, &config, &metrics, 7, dir.path()).unwrap();
        assert_eq!(path, dir.path().join("checkpoint_epoch_0007"));

        let (loaded, meta, loaded_metrics) =
            load_checkpoint::<TestBackend>(&path, &device).unwrap();

        assert_eq!(meta.epoch, 7);
        assert_eq!(meta.gen_loss, 1.5);
        assert_eq!(meta.model, config);
        assert_eq!(loaded_metrics, metrics);

        let noise = latent_noise::<TestBackend>(3, 4, &device);
        let expected = gan.generator.forward(noise.clone()).into_data();
        let actual = loaded.generator.forward(noise).into_data();
        expected.assert_approx_eq(&actual, 5);
    }

    #[test]
    fn test_find_latest_checkpoint() {
        let dir = tempdir().unwrap();
        let config = small_model_config();
        let gan = small_gan(&config);
        let metrics = TrainingMetrics::new();

        assert!(find_latest_checkpoint(dir.path()).is_none());

        for epoch in [2, 10, 5] {
            save_checkpoint(&gan, &config, &metrics, epoch, dir.path()).unwrap();
        }
        std::fs::create_dir(dir.path().join("unrelated")).unwrap();

        assert_eq!(
            find_latest_checkpoint(dir.path()),
            Some(dir.path().join("checkpoint_epoch_0010"))
        );

        let epochs: Vec<usize> = list_checkpoints(dir.path())
            .into_iter()
            .map(|(_, meta)| meta.epoch)
            .collect();
        assert_eq!(epochs, vec![2, 5, 10]);
    }

    #[test]
    fn test_load_missing_checkpoint() {
        let dir = tempdir().unwrap();
        let result = load_checkpoint::<TestBackend>(&dir.path().join("nope"), &Default::default());
        assert!(matches!(result, Err(GanError::Checkpoint(_))));
    }
}
