//! Sample grids for visual inspection of the generator
//!
//! Renders a batch of generated images into a single tiled PNG.

use std::path::{Path, PathBuf};

use burn::tensor::backend::Backend;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use ndarray::{Array4, ArrayView4};

use crate::data::denormalize_pixel;
use crate::error::{GanError, Result};
use crate::model::Generator;

/// Arrangement of tiles in a sample grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub rows: usize,
    pub cols: usize,
}

impl GridLayout {
    /// Smallest near-square grid holding `samples` tiles
    ///
    /// 16 samples give a 4x4 grid.
    pub fn for_samples(samples: usize) -> Self {
        if samples == 0 {
            return Self { rows: 0, cols: 0 };
        }
        let cols = (samples as f64).sqrt().ceil() as usize;
        let rows = (samples + cols - 1) / cols;
        Self { rows, cols }
    }

    pub fn capacity(&self) -> usize {
        self.rows * self.cols
    }

    /// (column, row) of tile `index`, filled row by row
    pub fn position(&self, index: usize) -> (usize, usize) {
        (index % self.cols, index / self.cols)
    }
}

/// Generates and saves sample grids
#[derive(Debug, Clone)]
pub struct Sampler {
    /// Number of images per grid
    pub samples: usize,
    /// Directory the PNG files are written to
    pub output_dir: PathBuf,
    /// File name prefix, files are named `<prefix>_<epoch>.png`
    pub prefix: String,
    /// Border between tiles, in pixels
    pub padding: u32,
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            samples: 16,
            output_dir: PathBuf::from("images"),
            prefix: "mnist".to_string(),
            padding: 2,
        }
    }
}

impl Sampler {
    pub fn new(samples: usize, output_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            samples,
            output_dir: output_dir.into(),
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Path of the grid saved for `epoch`
    pub fn file_path(&self, epoch: usize) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.png", self.prefix, epoch))
    }

    /// Generate `samples` images from fresh noise and tile them into a grid
    pub fn render<B: Backend>(
        &self,
        generator: &Generator<B>,
        device: &B::Device,
    ) -> Result<DynamicImage> {
        let shape = generator.image_shape();
        let output = generator.generate(self.samples, device);
        let values: Vec<f32> = output.into_data().iter::<f32>().collect();
        let images = Array4::from_shape_vec(
            (self.samples, shape.width, shape.height, shape.channels),
            values,
        )?;

        tile_images(images.view(), GridLayout::for_samples(self.samples), self.padding)
    }

    /// Render a grid and write it to [`Sampler::file_path`] for `epoch`
    pub fn save<B: Backend>(
        &self,
        generator: &Generator<B>,
        epoch: usize,
        device: &B::Device,
    ) -> Result<PathBuf> {
        let path = self.file_path(epoch);
        self.save_to(generator, &path, device)?;
        Ok(path)
    }

    /// Render a grid and write it to `path`
    pub fn save_to<B: Backend>(
        &self,
        generator: &Generator<B>,
        path: &Path,
        device: &B::Device,
    ) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.render(generator, device)?.save(path)?;
        Ok(())
    }
}

/// Tile a batch of images in [-1, 1] into one image
///
/// # Arguments
///
/// * `images` - Array of shape (batch, width, height, channels)
/// * `layout` - Grid arrangement, must hold at least `batch` tiles
/// * `padding` - Border between tiles, in pixels
pub fn tile_images(
    images: ArrayView4<'_, f32>,
    layout: GridLayout,
    padding: u32,
) -> Result<DynamicImage> {
    let dims = images.shape();
    let (count, width, height, channels) = (dims[0], dims[1], dims[2], dims[3]);

    if layout.capacity() < count {
        return Err(GanError::Config(format!(
            "grid {}x{} cannot hold {} images",
            layout.rows, layout.cols, count
        )));
    }

    let canvas_width = layout.cols as u32 * (width as u32 + padding) + padding;
    let canvas_height = layout.rows as u32 * (height as u32 + padding) + padding;

    let origin = |index: usize| {
        let (col, row) = layout.position(index);
        (
            padding + col as u32 * (width as u32 + padding),
            padding + row as u32 * (height as u32 + padding),
        )
    };

    match channels {
        1 => {
            let mut canvas = GrayImage::new(canvas_width, canvas_height);
            for i in 0..count {
                let (ox, oy) = origin(i);
                for x in 0..width {
                    for y in 0..height {
                        let value = denormalize_pixel(images[[i, x, y, 0]]);
                        canvas.put_pixel(ox + x as u32, oy + y as u32, Luma([value]));
                    }
                }
            }
            Ok(DynamicImage::ImageLuma8(canvas))
        }
        3 => {
            let mut canvas = RgbImage::new(canvas_width, canvas_height);
            for i in 0..count {
                let (ox, oy) = origin(i);
                for x in 0..width {
                    for y in 0..height {
                        let pixel = [0, 1, 2].map(|c| denormalize_pixel(images[[i, x, y, c]]));
                        canvas.put_pixel(ox + x as u32, oy + y as u32, Rgb(pixel));
                    }
                }
            }
            Ok(DynamicImage::ImageRgb8(canvas))
        }
        other => Err(GanError::UnsupportedChannels(other)),
    }
}
