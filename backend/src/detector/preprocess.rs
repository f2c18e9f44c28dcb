use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;

use crate::config::ImageConfig;

/// Uploaded image normalized to 8-bit RGB.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: RgbImage,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Upload is empty")]
    Empty,
    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[error("{0}")]
    Decode(#[from] image::ImageError),
}

impl DecodedImage {
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }
}

/// Decodes any format `image` recognises and converts it to RGB8, dropping
/// alpha and expanding grayscale and palette images.
pub fn decode_rgb(bytes: &[u8], max_bytes: usize) -> Result<DecodedImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(DecodeError::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }
    let image = image::load_from_memory(bytes)?;
    Ok(DecodedImage::from_rgb(image.to_rgb8()))
}

/// Resize + rescale + normalize into an NCHW batch of one.
#[derive(Debug, Clone)]
pub struct ImageTransform {
    width: u32,
    height: u32,
    filter: FilterType,
    mean: [f32; 3],
    std: [f32; 3],
}

impl ImageTransform {
    pub fn from_config(config: &ImageConfig) -> Self {
        let (width, height) = config.dimensions();
        Self {
            width,
            height,
            filter: config.preprocessing.resize_method.filter(),
            mean: config.normalization.mean,
            std: config.normalization.std,
        }
    }

    pub fn apply(&self, image: &DecodedImage) -> Array4<f32> {
        let resized = if image.width() == self.width && image.height() == self.height {
            image.as_rgb().clone()
        } else {
            imageops::resize(image.as_rgb(), self.width, self.height, self.filter)
        };

        let mut tensor = Array4::<f32>::zeros((1, 3, self.height as usize, self.width as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                let value = pixel[c] as f32 / 255.0;
                tensor[[0, c, y as usize, x as usize]] = (value - self.mean[c]) / self.std[c];
            }
        }
        tensor
    }
}
