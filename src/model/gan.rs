//! GAN wrapper combining Generator and Discriminator
//!
//! Also provides the stacked generator -> discriminator model used for the
//! generator update, with the discriminator frozen.

use std::path::Path;

use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::{backend::Backend, Tensor},
};

use super::discriminator::{Discriminator, DiscriminatorConfig};
use super::generator::{Generator, GeneratorConfig};
use crate::data::ImageShape;
use crate::error::{GanError, Result};

/// Complete GAN model
#[derive(Module, Debug)]
pub struct Gan<B: Backend> {
    /// Generator network
    pub generator: Generator<B>,
    /// Discriminator network
    pub discriminator: Discriminator<B>,
}

impl<B: Backend> Gan<B> {
    /// Create a new GAN model
    pub fn new(
        device: &B::Device,
        gen_config: &GeneratorConfig,
        disc_config: &DiscriminatorConfig,
    ) -> Self {
        Self {
            generator: Generator::new(device, gen_config),
            discriminator: Discriminator::new(device, disc_config),
        }
    }

    /// Create a GAN with the default topology for the given image shape
    pub fn with_defaults(device: &B::Device, shape: ImageShape, latent_dim: usize) -> Self {
        let gen_config = GeneratorConfig {
            latent_dim,
            shape,
            ..Default::default()
        };
        let disc_config = DiscriminatorConfig {
            shape,
            ..Default::default()
        };
        Self::new(device, &gen_config, &disc_config)
    }

    /// Stacked model sharing this GAN's parameters
    pub fn stacked(&self) -> StackedModel<'_, B> {
        StackedModel::new(&self.generator, &self.discriminator)
    }

    /// Discriminator probabilities for images generated from `noise`
    pub fn stacked_forward(&self, noise: Tensor<B, 2>) -> Tensor<B, 2> {
        self.stacked().forward(noise)
    }

    pub fn latent_dim(&self) -> usize {
        self.generator.latent_dim()
    }

    pub fn image_shape(&self) -> ImageShape {
        self.generator.image_shape()
    }

    /// Save both networks as `generator` and `discriminator` records in `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.generator
            .clone()
            .save_file(dir.join("generator"), &recorder)
            .map_err(|e| GanError::Checkpoint(format!("saving generator: {:?}", e)))?;
        self.discriminator
            .clone()
            .save_file(dir.join("discriminator"), &recorder)
            .map_err(|e| GanError::Checkpoint(format!("saving discriminator: {:?}", e)))?;
        Ok(())
    }

    /// Load both networks from records written by [`Gan::save`]
    pub fn load(self, dir: &Path, device: &B::Device) -> Result<Self> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let generator = self
            .generator
            .load_file(dir.join("generator"), &recorder, device)
            .map_err(|e| GanError::Checkpoint(format!("loading generator: {:?}", e)))?;
        let discriminator = self
            .discriminator
            .load_file(dir.join("discriminator"), &recorder, device)
            .map_err(|e| GanError::Checkpoint(format!("loading discriminator: {:?}", e)))?;
        Ok(Self {
            generator,
            discriminator,
        })
    }
}

/// Generator followed by a frozen discriminator
///
/// The generator is borrowed, so gradients of the stacked output reach the
/// live generator parameters. The discriminator is a `no_grad` fork: it
/// shares the current weights but never receives gradients.
pub struct StackedModel<'a, B: Backend> {
    generator: &'a Generator<B>,
    discriminator: Discriminator<B>,
}

impl<'a, B: Backend> StackedModel<'a, B> {
    pub fn new(generator: &'a Generator<B>, discriminator: &Discriminator<B>) -> Self {
        Self {
            generator,
            discriminator: discriminator.clone().no_grad(),
        }
    }

    /// Probability the discriminator assigns to images generated from `noise`
    pub fn forward(&self, noise: Tensor<B, 2>) -> Tensor<B, 2> {
        self.discriminator.forward(self.generator.forward(noise))
    }
}
