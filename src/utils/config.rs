//! Configuration management
//!
//! Provides unified configuration for data loading, model topology and
//! training, loadable from JSON or TOML.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::{DataSource, ImageShape};
use crate::error::{GanError, Result};
use crate::model::{DiscriminatorConfig, GeneratorConfig};
use crate::training::TrainingConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data configuration
    pub data: DataConfig,
    /// Model configuration
    pub model: ModelConfig,
    /// Training configuration
    pub training: TrainingConfigFile,
}

/// Data-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Where the training images come from
    pub source: DataSource,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: DataSource::Directory(PathBuf::from("data")),
        }
    }
}

/// Model-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
    /// 1 for grayscale, 3 for RGB
    pub channels: usize,
    /// Latent dimension size
    pub latent_dim: usize,
    /// Hidden layer widths of the generator
    pub hidden_sizes: Vec<usize>,
    /// Leaky ReLU slope of both networks
    pub negative_slope: f64,
    /// Generator batch norm momentum
    pub momentum: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let generator = GeneratorConfig::default();
        Self {
            width: generator.shape.width,
            height: generator.shape.height,
            channels: generator.shape.channels,
            latent_dim: generator.latent_dim,
            hidden_sizes: generator.hidden_sizes,
            negative_slope: generator.negative_slope,
            momentum: generator.momentum,
        }
    }
}

impl ModelConfig {
    pub fn image_shape(&self) -> ImageShape {
        ImageShape::new(self.width, self.height, self.channels)
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            latent_dim: self.latent_dim,
            shape: self.image_shape(),
            hidden_sizes: self.hidden_sizes.clone(),
            negative_slope: self.negative_slope,
            momentum: self.momentum,
        }
    }

    pub fn discriminator_config(&self) -> DiscriminatorConfig {
        DiscriminatorConfig {
            shape: self.image_shape(),
            negative_slope: self.negative_slope,
        }
    }
}

/// Training-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfigFile {
    /// Number of epochs
    pub epochs: usize,
    /// Batch size, must be even
    pub batch_size: usize,
    /// Sample grid frequency
    pub save_interval: usize,
    /// Images per sample grid
    pub samples: usize,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Time-based learning rate decay
    pub decay: f64,
    pub beta_1: f32,
    pub beta_2: f32,
    pub epsilon: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Sample grid directory
    pub output_dir: String,
    /// Sample grid file name prefix
    pub file_prefix: String,
    /// Checkpoint save frequency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_every: Option<usize>,
    /// Checkpoint directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_dir: Option<String>,
}

impl Default for TrainingConfigFile {
    fn default() -> Self {
        let training = TrainingConfig::default();
        Self {
            epochs: training.epochs,
            batch_size: training.batch_size,
            save_interval: training.save_interval,
            samples: training.samples,
            learning_rate: training.learning_rate,
            decay: training.decay,
            beta_1: training.beta_1,
            beta_2: training.beta_2,
            epsilon: training.epsilon,
            seed: training.seed,
            output_dir: training.output_dir.to_string_lossy().into_owned(),
            file_prefix: training.file_prefix,
            checkpoint_every: Some(1000),
            checkpoint_dir: Some("checkpoints".to_string()),
        }
    }
}

impl Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from TOML file
    pub fn from_toml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_toml(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from JSON or TOML depending on the file extension
    pub fn load(path: &Path) -> Result<Self> {
        if is_toml(path) {
            Self::from_toml(path)
        } else {
            Self::from_json(path)
        }
    }

    /// Save as JSON or TOML depending on the file extension
    pub fn save(&self, path: &Path) -> Result<()> {
        if is_toml(path) {
            self.save_toml(path)
        } else {
            self.save_json(path)
        }
    }

    /// Load `path` if it exists, use defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let model = &self.model;
        let training = &self.training;

        if model.width == 0 || model.height == 0 {
            return Err(invalid("Image dimensions must be > 0"));
        }
        if model.channels != 1 && model.channels != 3 {
            return Err(invalid(format!(
                "Channels must be 1 or 3, got {}",
                model.channels
            )));
        }
        if model.latent_dim == 0 {
            return Err(invalid("Latent dimension must be > 0"));
        }
        if model.hidden_sizes.iter().any(|&size| size == 0) {
            return Err(invalid("Hidden layer sizes must be > 0"));
        }
        if !(0.0..=1.0).contains(&model.momentum) {
            return Err(invalid("Batch norm momentum must be in [0, 1]"));
        }
        if training.epochs == 0 {
            return Err(invalid("Number of epochs must be > 0"));
        }
        if training.batch_size < 2 || training.batch_size % 2 != 0 {
            return Err(invalid(format!(
                "Batch size must be even and >= 2, got {}",
                training.batch_size
            )));
        }
        if training.save_interval == 0 {
            return Err(invalid("Save interval must be > 0"));
        }
        if training.samples == 0 {
            return Err(invalid("Number of samples must be > 0"));
        }
        if training.learning_rate <= 0.0 {
            return Err(invalid("Learning rate must be > 0"));
        }
        if training.checkpoint_every == Some(0) {
            return Err(invalid("Checkpoint frequency must be > 0"));
        }
        Ok(())
    }

    pub fn image_shape(&self) -> ImageShape {
        self.model.image_shape()
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        self.model.generator_config()
    }

    pub fn discriminator_config(&self) -> DiscriminatorConfig {
        self.model.discriminator_config()
    }

    /// Runtime training configuration
    pub fn training_config(&self) -> TrainingConfig {
        let training = &self.training;
        TrainingConfig {
            epochs: training.epochs,
            batch_size: training.batch_size,
            save_interval: training.save_interval,
            samples: training.samples,
            learning_rate: training.learning_rate,
            decay: training.decay,
            beta_1: training.beta_1,
            beta_2: training.beta_2,
            epsilon: training.epsilon,
            seed: training.seed,
            output_dir: PathBuf::from(&training.output_dir),
            file_prefix: training.file_prefix.clone(),
            checkpoint_every: training.checkpoint_every,
            checkpoint_dir: training.checkpoint_dir.as_ref().map(PathBuf::from),
        }
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "toml")
}

fn invalid(message: impl Into<String>) -> GanError {
    GanError::Config(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.image_shape(), ImageShape::new(96, 96, 3));
        assert_eq!(config.model.latent_dim, 100);
        assert_eq!(config.training.epochs, 20000);
        assert_eq!(config.training.batch_size, 32);
        assert_eq!(config.training.save_interval, 200);
        assert_eq!(config.training.output_dir, "images");
        assert_eq!(config.training.file_prefix, "mnist");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.data.source = DataSource::PickleArchive(PathBuf::from("mnist.pkl.gz"));
        config.training.seed = Some(7);
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.model.channels = 1;
        config.training.checkpoint_dir = None;
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("kind = \"directory\""));

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"training": {"epochs": 5}}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.training.epochs, 5);
        assert_eq!(config.training.batch_size, 32);
        assert_eq!(config.model, ModelConfig::default());
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.training.batch_size = 31;
        assert!(matches!(config.validate(), Err(GanError::Config(_))));

        config.training.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.channels = 2;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.training.save_interval = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.training.epochs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_training_config_conversion() {
        let config = Config::default();
        let training = config.training_config();

        assert_eq!(training.half_batch(), 16);
        assert_eq!(training.output_dir, PathBuf::from("images"));
        assert_eq!(training.checkpoint_dir, Some(PathBuf::from("checkpoints")));

        let generator = config.generator_config();
        assert_eq!(generator.hidden_sizes, vec![256, 512, 1024]);
        assert_eq!(config.discriminator_config().shape, config.image_shape());
    }
}
