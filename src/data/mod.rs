//! Data module for loading and preparing training images
//!
//! This module provides:
//! - Image sources (image directory or gzip pickle archive)
//! - Pixel rescaling between [0, 255] and [-1, 1]
//! - In-memory dataset with random contiguous batch sampling

mod dataset;
mod loader;
mod preprocessing;

pub use dataset::{images_to_tensor, ImageDataset, ImageShape};
pub use loader::{
    image_to_pixels, load_image_directory, load_pickle_archive, DataSource, PickleArchive,
    PickleSplit,
};
pub use preprocessing::{denormalize_images, denormalize_pixel, normalize_pixel, normalize_pixels};
