//! Generator network
//!
//! Maps a latent noise vector to an image through a stack of fully-connected
//! blocks (dense -> leaky ReLU -> batch norm) and a final tanh projection.

use burn::{
    module::Module,
    nn::{BatchNorm, BatchNormConfig, LeakyRelu, LeakyReluConfig, Linear, LinearConfig},
    tensor::{activation::tanh, backend::Backend, Distribution, Tensor},
};

use crate::data::ImageShape;

/// Batch norm variance epsilon
const NORM_EPSILON: f64 = 1e-3;

/// Generator network configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Size of the latent noise vector
    pub latent_dim: usize,
    /// Shape of the generated images
    pub shape: ImageShape,
    /// Widths of the hidden dense layers
    pub hidden_sizes: Vec<usize>,
    /// Negative slope of the leaky ReLU activations
    pub negative_slope: f64,
    /// Batch norm momentum, as the weight kept by the running statistics
    pub momentum: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            latent_dim: 100,
            shape: ImageShape::default(),
            hidden_sizes: vec![256, 512, 1024],
            negative_slope: 0.2,
            momentum: 0.8,
        }
    }
}

/// Dense layer followed by batch normalization
#[derive(Module, Debug)]
pub struct GeneratorBlock<B: Backend> {
    linear: Linear<B>,
    norm: BatchNorm<B, 0>,
}

/// Generator network
///
/// Architecture:
/// 1. `hidden_sizes.len()` blocks of Dense -> LeakyReLU -> BatchNorm
/// 2. Dense layer to `width * height * channels` with tanh
/// 3. Reshape to (batch, width, height, channels)
#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    pub(crate) blocks: Vec<GeneratorBlock<B>>,
    pub(crate) output: Linear<B>,
    activation: LeakyRelu,
    latent_dim: usize,
    width: usize,
    height: usize,
    channels: usize,
}

impl<B: Backend> Generator<B> {
    /// Create a new Generator network
    pub fn new(device: &B::Device, config: &GeneratorConfig) -> Self {
        let mut blocks = Vec::with_capacity(config.hidden_sizes.len());
        let mut in_features = config.latent_dim;

        for &size in &config.hidden_sizes {
            // burn weighs the new batch statistics by `momentum`
            let norm = BatchNormConfig::new(size)
                .with_momentum(1.0 - config.momentum)
                .with_epsilon(NORM_EPSILON)
                .init(device);
            blocks.push(GeneratorBlock {
                linear: LinearConfig::new(in_features, size).init(device),
                norm,
            });
            in_features = size;
        }

        let output = LinearConfig::new(in_features, config.shape.numel()).init(device);

        Self {
            blocks,
            output,
            activation: LeakyReluConfig::new()
                .with_negative_slope(config.negative_slope)
                .init(),
            latent_dim: config.latent_dim,
            width: config.shape.width,
            height: config.shape.height,
            channels: config.shape.channels,
        }
    }

    /// Generate images from noise
    ///
    /// # Arguments
    ///
    /// * `noise` - Tensor of shape (batch_size, latent_dim)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch_size, width, height, channels) in [-1, 1]
    pub fn forward(&self, noise: Tensor<B, 2>) -> Tensor<B, 4> {
        let [batch_size, _] = noise.dims();

        let mut x = noise;
        for block in &self.blocks {
            x = block.linear.forward(x);
            x = self.activation.forward(x);
            x = block.norm.forward(x);
        }

        let x = tanh(self.output.forward(x));
        x.reshape([batch_size, self.width, self.height, self.channels])
    }

    /// Generate `num_samples` images from fresh standard-normal noise
    pub fn generate(&self, num_samples: usize, device: &B::Device) -> Tensor<B, 4> {
        self.forward(latent_noise(num_samples, self.latent_dim, device))
    }

    pub fn latent_dim(&self) -> usize {
        self.latent_dim
    }

    pub fn image_shape(&self) -> ImageShape {
        ImageShape::new(self.width, self.height, self.channels)
    }
}

/// Sample a (num_samples, latent_dim) batch of standard-normal latent vectors
pub fn latent_noise<B: Backend>(
    num_samples: usize,
    latent_dim: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    Tensor::random(
        [num_samples, latent_dim],
        Distribution::Normal(0.0, 1.0),
        device,
    )
}
