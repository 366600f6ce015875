//! Image decoding and tensor preparation
//!
//! Images are stretched to a square `size x size` input (aspect ratio is not
//! preserved), scaled to `[0, 1]` and laid out channel-major (NCHW): every R
//! sample first, then G, then B, each in row-major pixel order.

use crate::error::DecodeError;
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// An uploaded image, read once and decoded once per request.
///
/// The encoded bytes are kept for the remote tier; the decoded pixels feed the
/// local model.
#[derive(Debug, Clone)]
pub struct SourceImage {
    path: PathBuf,
    bytes: Arc<[u8]>,
    decoded: Arc<DynamicImage>,
}

impl SourceImage {
    /// Read and decode the image at `path` without blocking the runtime
    pub async fn load(path: &Path) -> Result<Self, DecodeError> {
        let bytes: Arc<[u8]> = tokio::fs::read(path)
            .await
            .map_err(|source| DecodeError::Read {
                path: path.to_path_buf(),
                source,
            })?
            .into();

        let owned_path = path.to_path_buf();
        let raw = bytes.clone();
        let decoded = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&raw).map_err(|source| DecodeError::Format {
                path: owned_path,
                source,
            })
        })
        .await
        .map_err(|e| DecodeError::Task(e.to_string()))??;

        debug!(
            path = %path.display(),
            width = decoded.width(),
            height = decoded.height(),
            "Decoded source image"
        );

        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            decoded: Arc::new(decoded),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encoded file contents as uploaded
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn decoded(&self) -> &DynamicImage {
        &self.decoded
    }

    pub(crate) fn decoded_shared(&self) -> Arc<DynamicImage> {
        self.decoded.clone()
    }
}

/// Fixed-shape model input: `(1, 3, size, size)`, values in `[0, 1]`
#[derive(Debug, Clone)]
pub struct ImageTensor {
    data: Array4<f32>,
}

impl ImageTensor {
    pub fn size(&self) -> usize {
        self.data.shape()[2]
    }

    pub fn shape(&self) -> [usize; 4] {
        let s = self.data.shape();
        [s[0], s[1], s[2], s[3]]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat channel-major view of the samples
    pub fn as_slice(&self) -> &[f32] {
        // Built from a standard-layout Vec, so always contiguous
        self.data.as_slice().unwrap_or(&[])
    }

    pub fn into_array(self) -> Array4<f32> {
        self.data
    }
}

/// Decode the file at `path` and build a `size x size` input tensor
pub fn preprocess(path: &Path, size: u32) -> Result<ImageTensor, DecodeError> {
    let img = image::ImageReader::open(path)
        .map_err(|source| DecodeError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .with_guessed_format()
        .map_err(|source| DecodeError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .decode()
        .map_err(|source| DecodeError::Format {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(tensor_from_image(&img, size))
}

/// Build the input tensor from an already decoded image
pub fn tensor_from_image(img: &DynamicImage, size: u32) -> ImageTensor {
    let rgb = img.resize_exact(size, size, FilterType::Triangle).to_rgb8();
    let raw = rgb.into_raw();

    let side = size as usize;
    let plane = side * side;
    let mut data = vec![0f32; 3 * plane];
    for (i, pixel) in raw.chunks_exact(3).enumerate() {
        data[i] = pixel[0] as f32 / 255.0;
        data[plane + i] = pixel[1] as f32 / 255.0;
        data[2 * plane + i] = pixel[2] as f32 / 255.0;
    }

    // Length is exactly 3 * side * side by construction
    let data = Array4::from_shape_vec((1, 3, side, side), data)
        .unwrap_or_else(|_| Array4::zeros((1, 3, side, side)));
    ImageTensor { data }
}
