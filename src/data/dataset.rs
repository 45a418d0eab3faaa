//! In-memory image dataset and batch sampling
//!
//! Holds the full training set as a 4D array of shape
//! (num_images, width, height, channels) with values in [-1, 1].

use std::fmt;

use burn::tensor::{backend::Backend, Tensor, TensorData};
use ndarray::{s, Array4, ArrayView4};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::preprocessing::normalize_pixels;
use crate::error::{GanError, Result};

/// Dimensions of a single image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

impl ImageShape {
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
        }
    }

    /// Number of values in one image
    pub fn numel(&self) -> usize {
        self.width * self.height * self.channels
    }

    /// Dimensions of a batch of `batch_size` images
    pub fn batch_dims(&self, batch_size: usize) -> [usize; 4] {
        [batch_size, self.width, self.height, self.channels]
    }
}

impl Default for ImageShape {
    fn default() -> Self {
        Self::new(96, 96, 3)
    }
}

impl fmt::Display for ImageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// Training images rescaled to [-1, 1]
#[derive(Debug, Clone)]
pub struct ImageDataset {
    images: Array4<f32>,
    shape: ImageShape,
}

impl ImageDataset {
    /// Build a dataset from raw [0, 255] intensities
    ///
    /// Each entry of `raw_images` must hold exactly `shape.numel()` values laid
    /// out as (x, y, channel).
    pub fn from_raw_images(raw_images: Vec<Vec<f32>>, shape: ImageShape) -> Result<Self> {
        let expected = shape.numel();
        let num_images = raw_images.len();
        let mut flat = Vec::with_capacity(num_images * expected);

        for (index, image) in raw_images.into_iter().enumerate() {
            if image.len() != expected {
                return Err(GanError::ShapeMismatch {
                    index,
                    shape,
                    expected,
                    found: image.len(),
                });
            }
            flat.extend(image);
        }

        normalize_pixels(&mut flat);

        let images = Array4::from_shape_vec(
            (num_images, shape.width, shape.height, shape.channels),
            flat,
        )?;

        Ok(Self { images, shape })
    }

    /// Wrap images that are already in [-1, 1]
    pub fn from_normalized(images: Array4<f32>) -> Self {
        let dims = images.shape();
        let shape = ImageShape::new(dims[1], dims[2], dims[3]);
        Self { images, shape }
    }

    pub fn len(&self) -> usize {
        self.images.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> ImageShape {
        self.shape
    }

    pub fn images(&self) -> ArrayView4<'_, f32> {
        self.images.view()
    }

    /// Pick a uniformly random start offset for a contiguous slice of `size` images
    ///
    /// Every offset in `0..=len - size` is reachable.
    pub fn random_start<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> Result<usize> {
        let available = self.len();
        if size == 0 || available < size {
            return Err(GanError::InsufficientData {
                available,
                required: size.max(1),
            });
        }
        Ok(rng.gen_range(0..=available - size))
    }

    /// Copy `size` consecutive images starting at `start`
    pub fn slice(&self, start: usize, size: usize) -> Result<Array4<f32>> {
        let available = self.len();
        if start + size > available {
            return Err(GanError::InsufficientData {
                available,
                required: start + size,
            });
        }
        Ok(self.images.slice(s![start..start + size, .., .., ..]).to_owned())
    }

    /// Sample a random contiguous slice of `size` real images
    pub fn random_batch<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> Result<Array4<f32>> {
        let start = self.random_start(size, rng)?;
        self.slice(start, size)
    }
}

/// Convert a batch array into a tensor on `device`
pub fn images_to_tensor<B: Backend>(images: &Array4<f32>, device: &B::Device) -> Tensor<B, 4> {
    let shape = images.shape();
    let data: Vec<f32> = images.iter().copied().collect();
    Tensor::from_data(
        TensorData::new(data, [shape[0], shape[1], shape[2], shape[3]]),
        device,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::{rngs::StdRng, SeedableRng};

    type TestBackend = NdArray<f32>;

    fn ramp_dataset(num_images: usize) -> ImageDataset {
        let shape = ImageShape::new(2, 2, 1);
        let raw = (0..num_images)
            .map(|i| vec![i as f32; shape.numel()])
            .collect();
        ImageDataset::from_raw_images(raw, shape).unwrap()
    }

    #[test]
    fn test_image_shape() {
        let shape = ImageShape::default();
        assert_eq!(shape.numel(), 96 * 96 * 3);
        assert_eq!(shape.batch_dims(4), [4, 96, 96, 3]);
        assert_eq!(shape.to_string(), "96x96x3");
    }

    #[test]
    fn test_from_raw_images_normalizes() {
        let shape = ImageShape::new(1, 2, 1);
        let dataset = ImageDataset::from_raw_images(vec![vec![0.0, 255.0]], shape).unwrap();

        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.images()[[0, 0, 0, 0]], -1.0);
        assert_eq!(dataset.images()[[0, 0, 1, 0]], 1.0);
    }

    #[test]
    fn test_from_raw_images_rejects_wrong_size() {
        let shape = ImageShape::new(2, 2, 1);
        let result = ImageDataset::from_raw_images(vec![vec![0.0; 4], vec![0.0; 3]], shape);

        match result {
            Err(GanError::ShapeMismatch {
                index,
                expected,
                found,
                ..
            }) => {
                assert_eq!(index, 1);
                assert_eq!(expected, 4);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_random_batch_is_contiguous() {
        let dataset = ramp_dataset(10);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..20 {
            let batch = dataset.random_batch(4, &mut rng).unwrap();
            assert_eq!(batch.shape(), &[4, 2, 2, 1]);

            let first = batch[[0, 0, 0, 0]];
            for i in 1..4 {
                let expected = first + i as f32 * (1.0 / 127.5);
                assert!((batch[[i, 0, 0, 0]] - expected).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_random_start_covers_last_offset() {
        let dataset = ramp_dataset(3);
        let mut rng = StdRng::seed_from_u64(1);

        let starts: Vec<usize> = (0..200)
            .map(|_| dataset.random_start(2, &mut rng).unwrap())
            .collect();

        assert!(starts.iter().all(|&s| s <= 1));
        assert!(starts.contains(&0));
        assert!(starts.contains(&1));
    }

    #[test]
    fn test_random_batch_exact_size() {
        let dataset = ramp_dataset(4);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(dataset.random_start(4, &mut rng).unwrap(), 0);
    }

    #[test]
    fn test_random_batch_insufficient_data() {
        let dataset = ramp_dataset(3);
        let mut rng = StdRng::seed_from_u64(0);

        assert!(matches!(
            dataset.random_batch(4, &mut rng),
            Err(GanError::InsufficientData {
                available: 3,
                required: 4
            })
        ));
    }

    #[test]
    fn test_images_to_tensor() {
        let dataset = ramp_dataset(3);
        let batch = dataset.slice(1, 2).unwrap();
        let tensor = images_to_tensor::<TestBackend>(&batch, &Default::default());

        assert_eq!(tensor.dims(), [2, 2, 2, 1]);
        let values: Vec<f32> = tensor.into_data().to_vec().unwrap();
        assert_eq!(values.len(), 8);
        assert_eq!(values[0], batch[[0, 0, 0, 0]]);
        assert_eq!(values[7], batch[[1, 1, 1, 0]]);
    }
}
