//! Pixel rescaling between on-disk intensities and the tanh range
//!
//! Images are stored as [0, 255] intensities and trained in [-1, 1], which is
//! the output range of the generator's final tanh activation.

use ndarray::{Array4, ArrayView4};

/// Midpoint of the [0, 255] intensity range
pub const PIXEL_CENTER: f32 = 127.5;

/// Rescale a single intensity from [0, 255] to [-1, 1]
///
/// Formula: x_norm = (x - 127.5) / 127.5
pub fn normalize_pixel(value: f32) -> f32 {
    (value - PIXEL_CENTER) / PIXEL_CENTER
}

/// Map a value in [-1, 1] back to a [0, 255] intensity
///
/// Values outside [-1, 1] are clamped.
pub fn denormalize_pixel(value: f32) -> u8 {
    (value * PIXEL_CENTER + PIXEL_CENTER).round().clamp(0.0, 255.0) as u8
}

/// Rescale raw intensities in place
pub fn normalize_pixels(values: &mut [f32]) {
    for v in values.iter_mut() {
        *v = normalize_pixel(*v);
    }
}

/// Convert a batch of normalized images back to [0, 255] intensities
///
/// # Arguments
///
/// * `images` - Array of shape (batch, width, height, channels) in [-1, 1]
pub fn denormalize_images(images: ArrayView4<'_, f32>) -> Array4<u8> {
    images.mapv(denormalize_pixel)
}
