//! Model module containing the GAN architecture
//!
//! This module provides:
//! - Generator network mapping latent noise to images
//! - Discriminator network scoring images as real or synthetic
//! - GAN wrapper and the stacked generator -> frozen discriminator model

mod discriminator;
mod gan;
mod generator;

pub use discriminator::{Discriminator, DiscriminatorConfig};
pub use gan::{Gan, StackedModel};
pub use generator::{latent_noise, Generator, GeneratorConfig};
