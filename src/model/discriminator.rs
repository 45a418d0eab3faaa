//! Discriminator network
//!
//! Classifies images as real or synthetic. The image is flattened and passed
//! through two leaky-ReLU dense layers before a single sigmoid unit.

use burn::{
    module::Module,
    nn::{LeakyRelu, LeakyReluConfig, Linear, LinearConfig},
    tensor::{activation::sigmoid, backend::Backend, Tensor},
};

use crate::data::ImageShape;

/// Discriminator network configuration
#[derive(Debug, Clone)]
pub struct DiscriminatorConfig {
    /// Shape of the classified images
    pub shape: ImageShape,
    /// Negative slope of the leaky ReLU activations
    pub negative_slope: f64,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self {
            shape: ImageShape::default(),
            negative_slope: 0.2,
        }
    }
}

/// Discriminator network
///
/// Architecture:
/// 1. Flatten (width, height, channels) to n = width * height * channels
/// 2. Dense(n) -> LeakyReLU -> Dense(n / 2) -> LeakyReLU
/// 3. Dense(1) with sigmoid
#[derive(Module, Debug)]
pub struct Discriminator<B: Backend> {
    pub(crate) fc1: Linear<B>,
    pub(crate) fc2: Linear<B>,
    pub(crate) output: Linear<B>,
    activation: LeakyRelu,
}

impl<B: Backend> Discriminator<B> {
    /// Create a new Discriminator network
    pub fn new(device: &B::Device, config: &DiscriminatorConfig) -> Self {
        let flat_size = config.shape.numel();
        let hidden_size = (flat_size / 2).max(1);

        Self {
            fc1: LinearConfig::new(flat_size, flat_size).init(device),
            fc2: LinearConfig::new(flat_size, hidden_size).init(device),
            output: LinearConfig::new(hidden_size, 1).init(device),
            activation: LeakyReluConfig::new()
                .with_negative_slope(config.negative_slope)
                .init(),
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `images` - Tensor of shape (batch_size, width, height, channels)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch_size, 1) with the probability of each image being real
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = images.flatten::<2>(1, 3);

        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);

        let x = self.fc2.forward(x);
        let x = self.activation.forward(x);

        sigmoid(self.output.forward(x))
    }
}
