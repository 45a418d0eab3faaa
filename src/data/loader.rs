//! Image sources for GAN training
//!
//! Two interchangeable sources feed the same [`ImageDataset`]:
//! - a directory of image files (any format the `image` crate decodes)
//! - a gzip-compressed pickle archive laid out as
//!   `((x_train, y_train), (x_test, y_test))`

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use image::{DynamicImage, ImageBuffer, Pixel};
use serde::{Deserialize, Serialize};
use serde_pickle::{DeOptions, ErrorCode, Value};
use tracing::{debug, info};

use super::dataset::{ImageDataset, ImageShape};
use crate::error::{GanError, Result};

/// Where training images come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum DataSource {
    /// Directory of image files, loaded in file-name order
    Directory(PathBuf),
    /// Gzip-compressed pickle archive of row-major examples; the training
    /// split is used
    PickleArchive(PathBuf),
}

impl DataSource {
    pub fn path(&self) -> &Path {
        match self {
            DataSource::Directory(path) | DataSource::PickleArchive(path) => path,
        }
    }

    /// Load the training images, validated against `shape` and rescaled to [-1, 1]
    pub fn load(&self, shape: ImageShape) -> Result<ImageDataset> {
        let raw = match self {
            DataSource::Directory(dir) => load_image_directory(dir, shape)?,
            DataSource::PickleArchive(path) => load_pickle_archive(path)?
                .train
                .images
                .into_iter()
                .map(|pixels| row_major_to_xy(pixels, shape))
                .collect(),
        };

        info!(
            "Loaded {} images of shape {} from {}",
            raw.len(),
            shape,
            self.path().display()
        );

        ImageDataset::from_raw_images(raw, shape)
    }
}

/// One split (train or test) of a pickle archive
#[derive(Debug, Clone, Default)]
pub struct PickleSplit {
    /// Flattened raw intensities, one entry per example
    pub images: Vec<Vec<f32>>,
    pub labels: Vec<i64>,
}

/// Decoded `((x_train, y_train), (x_test, y_test))` archive
#[derive(Debug, Clone, Default)]
pub struct PickleArchive {
    pub train: PickleSplit,
    pub test: PickleSplit,
}

/// Read every decodable image in `dir` as raw (x, y, channel) intensities
///
/// Files whose extension is not a known image format are skipped. Images are
/// converted to grayscale for one channel and RGB for three.
pub fn load_image_directory(dir: &Path, shape: ImageShape) -> Result<Vec<Vec<f32>>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        if image::ImageFormat::from_path(&path).is_err() {
            debug!("Skipping non-image file {}", path.display());
            continue;
        }

        let decoded = image::open(&path).map_err(|e| GanError::DataLoad {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        images.push(image_to_pixels(&decoded, shape, images.len())?);
    }

    Ok(images)
}

/// Convert a decoded image into a flat (x, y, channel) vector
pub fn image_to_pixels(image: &DynamicImage, shape: ImageShape, index: usize) -> Result<Vec<f32>> {
    let found = image.width() as usize * image.height() as usize * shape.channels;
    if image.width() as usize != shape.width || image.height() as usize != shape.height {
        return Err(GanError::ShapeMismatch {
            index,
            shape,
            expected: shape.numel(),
            found,
        });
    }

    match shape.channels {
        1 => Ok(buffer_to_pixels(&image.to_luma8())),
        3 => Ok(buffer_to_pixels(&image.to_rgb8())),
        other => Err(GanError::UnsupportedChannels(other)),
    }
}

fn buffer_to_pixels<P: Pixel<Subpixel = u8>>(buffer: &ImageBuffer<P, Vec<u8>>) -> Vec<f32> {
    let mut pixels = Vec::with_capacity(buffer.as_raw().len());
    for x in 0..buffer.width() {
        for y in 0..buffer.height() {
            pixels.extend(buffer.get_pixel(x, y).channels().iter().map(|&v| f32::from(v)));
        }
    }
    pixels
}

/// Reorder a row-major (y, x, channel) example into (x, y, channel)
///
/// Examples of the wrong size are returned unchanged so the dataset reports
/// the mismatch.
fn row_major_to_xy(pixels: Vec<f32>, shape: ImageShape) -> Vec<f32> {
    if pixels.len() != shape.numel() {
        return pixels;
    }

    let ImageShape {
        width,
        height,
        channels,
    } = shape;
    let mut reordered = vec![0.0; pixels.len()];
    for y in 0..height {
        for x in 0..width {
            let src = (y * width + x) * channels;
            let dst = (x * height + y) * channels;
            reordered[dst..dst + channels].copy_from_slice(&pixels[src..src + channels]);
        }
    }
    reordered
}

/// Load a gzip-compressed pickle archive
pub fn load_pickle_archive(path: &Path) -> Result<PickleArchive> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(BufReader::new(file));
    let value = serde_pickle::value_from_reader(decoder, DeOptions::new()).map_err(|e| match e {
        serde_pickle::Error::Syntax(ErrorCode::UnresolvedGlobal) => GanError::DataLoad {
            path: path.to_path_buf(),
            reason: "archive references Python objects; numpy arrays are unsupported, \
                     store images as lists or byte strings"
                .to_string(),
        },
        other => GanError::Pickle(other),
    })?;

    let archive = parse_archive(value).map_err(|reason| GanError::DataLoad {
        path: path.to_path_buf(),
        reason,
    })?;

    debug!(
        "Pickle archive {}: {} train / {} test examples",
        path.display(),
        archive.train.images.len(),
        archive.test.images.len()
    );

    Ok(archive)
}

fn parse_archive(value: Value) -> std::result::Result<PickleArchive, String> {
    let mut splits = into_pair(value, "archive")?;
    let test = parse_split(splits.pop().ok_or("missing test split")?)?;
    let train = parse_split(splits.pop().ok_or("missing train split")?)?;
    Ok(PickleArchive { train, test })
}

fn parse_split(value: Value) -> std::result::Result<PickleSplit, String> {
    let mut parts = into_pair(value, "split")?;
    let labels_value = parts.pop().ok_or("missing labels")?;
    let images_value = parts.pop().ok_or("missing images")?;

    let images = into_sequence(images_value, "images")?
        .into_iter()
        .map(|example| {
            let mut pixels = Vec::new();
            flatten_numbers(example, &mut pixels)?;
            Ok(pixels)
        })
        .collect::<std::result::Result<Vec<_>, String>>()?;

    let mut label_values = Vec::new();
    flatten_numbers(labels_value, &mut label_values)?;
    let labels = label_values.into_iter().map(|v| v as i64).collect();

    Ok(PickleSplit { images, labels })
}

fn into_sequence(value: Value, what: &str) -> std::result::Result<Vec<Value>, String> {
    match value {
        Value::List(items) | Value::Tuple(items) => Ok(items),
        other => Err(format!("expected a sequence for {}, found {:?}", what, other)),
    }
}

fn into_pair(value: Value, what: &str) -> std::result::Result<Vec<Value>, String> {
    let items = into_sequence(value, what)?;
    if items.len() != 2 {
        return Err(format!("expected a pair for {}, found {} items", what, items.len()));
    }
    Ok(items)
}

fn flatten_numbers(value: Value, out: &mut Vec<f32>) -> std::result::Result<(), String> {
    match value {
        Value::I64(v) => out.push(v as f32),
        Value::F64(v) => out.push(v as f32),
        Value::Bool(v) => out.push(if v { 1.0 } else { 0.0 }),
        Value::Bytes(bytes) => out.extend(bytes.into_iter().map(f32::from)),
        Value::List(items) | Value::Tuple(items) => {
            for item in items {
                flatten_numbers(item, out)?;
            }
        }
        other => return Err(format!("unsupported pickle value {:?}", other)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use crate::data::normalize_pixel;
    use serde_pickle::SerOptions;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_archive(path: &Path) {
        let train_images: Vec<Vec<f64>> = vec![vec![0.0, 64.0, 128.0, 255.0], vec![10.0, 20.0, 30.0, 40.0]];
        let train_labels: Vec<i64> = vec![3, 7];
        let test_images: Vec<Vec<f64>> = vec![vec![1.0, 2.0, 3.0, 4.0]];
        let test_labels: Vec<i64> = vec![1];
        let archive = ((train_images, train_labels), (test_images, test_labels));

        let file = File::create(path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        serde_pickle::to_writer(&mut encoder, &archive, SerOptions::new()).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_pickle_archive_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mnist.pkl.gz");
        write_archive(&path);

        let archive = load_pickle_archive(&path).unwrap();

        assert_eq!(archive.train.images.len(), 2);
        assert_eq!(archive.train.images[0], vec![0.0, 64.0, 128.0, 255.0]);
        assert_eq!(archive.train.images[1], vec![10.0, 20.0, 30.0, 40.0]);
        assert_eq!(archive.train.labels, vec![3, 7]);
        assert_eq!(archive.test.images, vec![vec![1.0, 2.0, 3.0, 4.0]]);
        assert_eq!(archive.test.labels, vec![1]);
    }

    #[test]
    fn test_pickle_source_loads_training_split() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mnist.pkl.gz");
        write_archive(&path);

        let dataset = DataSource::PickleArchive(path)
            .load(ImageShape::new(2, 2, 1))
            .unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.images()[[0, 0, 0, 0]], -1.0);
        assert_eq!(dataset.images()[[0, 1, 1, 0]], 1.0);
    }

    #[test]
    fn test_pickle_and_directory_sources_agree() {
        let dir = tempdir().unwrap();
        let image_dir = dir.path().join("images");
        std::fs::create_dir(&image_dir).unwrap();

        // 3 wide, 2 tall; value = 10 * row + column
        let mut img = GrayImage::new(3, 2);
        let mut rows = Vec::new();
        for row in 0..2u32 {
            for col in 0..3u32 {
                let value = (10 * row + col) as u8;
                img.put_pixel(col, row, Luma([value]));
                rows.push(f64::from(value));
            }
        }
        img.save(image_dir.join("digit.png")).unwrap();

        let archive_path = dir.path().join("digits.pkl.gz");
        let archive = ((vec![rows], vec![0i64]), (Vec::<Vec<f64>>::new(), Vec::<i64>::new()));
        let mut encoder = GzEncoder::new(File::create(&archive_path).unwrap(), Compression::default());
        serde_pickle::to_writer(&mut encoder, &archive, SerOptions::new()).unwrap();
        encoder.finish().unwrap();

        let shape = ImageShape::new(3, 2, 1);
        let from_dir = DataSource::Directory(image_dir).load(shape).unwrap();
        let from_pickle = DataSource::PickleArchive(archive_path).load(shape).unwrap();

        assert_eq!(from_dir.images(), from_pickle.images());
        assert_eq!(from_pickle.images()[[0, 2, 1, 0]], normalize_pixel(12.0));
    }

    #[test]
    fn test_row_major_to_xy_rgb() {
        // 2 wide, 1 tall, 3 channels
        let pixels = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(row_major_to_xy(pixels.clone(), ImageShape::new(2, 1, 3)), pixels);

        // 1 wide, 2 tall is already (x, y) ordered
        let column = vec![7.0, 8.0];
        assert_eq!(row_major_to_xy(column.clone(), ImageShape::new(1, 2, 1)), column);

        // 2x2: rows [a, b], [c, d] become columns [a, c], [b, d]
        let square = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(
            row_major_to_xy(square, ImageShape::new(2, 2, 1)),
            vec![1.0, 3.0, 2.0, 4.0]
        );
    }

    #[test]
    fn test_pickle_archive_with_numpy_arrays() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mnist.pkl.gz");

        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder
            .write_all(b"\x80\x02cnumpy.core.multiarray\n_reconstruct\n)R.")
            .unwrap();
        encoder.finish().unwrap();

        match load_pickle_archive(&path) {
            Err(GanError::DataLoad { reason, .. }) => assert!(reason.contains("numpy")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_pickle_source_shape_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mnist.pkl.gz");
        write_archive(&path);

        let result = DataSource::PickleArchive(path).load(ImageShape::new(3, 3, 1));
        assert!(matches!(result, Err(GanError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_parse_archive_rejects_bad_layout() {
        let value = Value::List(vec![Value::I64(1)]);
        assert!(parse_archive(value).is_err());
    }

    #[test]
    fn test_directory_loader_rgb() {
        let dir = tempdir().unwrap();
        for (i, name) in ["b.png", "a.png"].iter().enumerate() {
            let mut img = RgbImage::new(2, 3);
            img.put_pixel(1, 2, Rgb([i as u8, 100, 200]));
            img.save(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let images = load_image_directory(dir.path(), ImageShape::new(2, 3, 3)).unwrap();

        assert_eq!(images.len(), 2);
        assert_eq!(images[0].len(), 18);
        // a.png sorts first and was written with i = 1
        let last = &images[0][15..18];
        assert_eq!(last, &[1.0, 100.0, 200.0]);
        assert_eq!(&images[1][15..18], &[0.0, 100.0, 200.0]);
    }

    #[test]
    fn test_directory_loader_grayscale_layout() {
        let dir = tempdir().unwrap();
        let mut img = GrayImage::new(2, 2);
        img.put_pixel(1, 0, Luma([255]));
        img.save(dir.path().join("x.png")).unwrap();

        let images = load_image_directory(dir.path(), ImageShape::new(2, 2, 1)).unwrap();

        // (x, y) ordering: index = x * height + y
        assert_eq!(images[0], vec![0.0, 0.0, 255.0, 0.0]);
    }

    #[test]
    fn test_directory_loader_rejects_wrong_size() {
        let dir = tempdir().unwrap();
        RgbImage::new(4, 4).save(dir.path().join("big.png")).unwrap();

        let result = load_image_directory(dir.path(), ImageShape::new(2, 2, 3));
        assert!(matches!(result, Err(GanError::ShapeMismatch { index: 0, .. })));
    }

    #[test]
    fn test_missing_directory() {
        let result = DataSource::Directory(PathBuf::from("/nonexistent/gan/images"))
            .load(ImageShape::default());
        assert!(matches!(result, Err(GanError::Io(_))));
    }
}
