//! Normalization of decoded images to a single float channel in [0, 1].

use std::path::Path;

use image::{DynamicImage, Rgb32FImage};
use tracing::debug;

use crate::{
    error::{PolarityError, Result},
    types::{FloatImage, GrayscaleImage},
};

/// Perceptual luminance weights (ITU-R BT.709)
const LUMA_WEIGHTS: [f32; 3] = [0.2125, 0.7154, 0.0721];

/// A decoded image with its channel layout resolved once.
///
/// Alpha channels are dropped. Values are scaled to [0, 1] by bit depth;
/// single-channel images are further normalized by their own maximum.
#[derive(Debug, Clone)]
pub enum SourceImage {
    SingleChannel(FloatImage),
    MultiChannel(Rgb32FImage),
}

impl SourceImage {
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        if image.color().has_color() {
            Self::MultiChannel(image.to_rgb32f())
        } else {
            Self::SingleChannel(image.to_luma32f())
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::SingleChannel(buffer) => buffer.dimensions(),
            Self::MultiChannel(buffer) => buffer.dimensions(),
        }
    }
}

impl GrayscaleImage {
    /// Decode and normalize an image file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let image = image::open(path)?;
        Self::from_dynamic(&image)
    }

    pub fn from_dynamic(image: &DynamicImage) -> Result<Self> {
        load_grayscale(&SourceImage::from_dynamic(image))
    }
}

/// Convert a source image to a [`GrayscaleImage`].
///
/// Fails with [`PolarityError::EmptyImage`] when the image has no pixels or
/// its maximum value is zero, and with [`PolarityError::UnsupportedImage`]
/// on negative or non-finite samples.
pub fn load_grayscale(source: &SourceImage) -> Result<GrayscaleImage> {
    let (width, height) = source.dimensions();
    if width == 0 || height == 0 {
        return Err(PolarityError::EmptyImage);
    }

    let gray = match source {
        SourceImage::SingleChannel(buffer) => {
            let max = checked_max(buffer.as_raw())?;
            if max <= 0.0 {
                return Err(PolarityError::EmptyImage);
            }
            debug!(width, height, max, "normalizing single-channel image");
            FloatImage::from_fn(width, height, |x, y| {
                image::Luma([buffer.get_pixel(x, y)[0] / max])
            })
        }
        SourceImage::MultiChannel(buffer) => {
            let max = checked_max(buffer.as_raw())?;
            if max <= 0.0 {
                return Err(PolarityError::EmptyImage);
            }
            // float sources may exceed the unit range; rescale by their peak channel
            let scale = if max > 1.0 { max.recip() } else { 1.0 };
            debug!(width, height, scale, "converting RGB image to luminance");
            FloatImage::from_fn(width, height, |x, y| {
                let [r, g, b] = buffer.get_pixel(x, y).0;
                let luma = LUMA_WEIGHTS[0] * r + LUMA_WEIGHTS[1] * g + LUMA_WEIGHTS[2] * b;
                image::Luma([(luma * scale).min(1.0)])
            })
        }
    };

    Ok(GrayscaleImage::from_normalized(gray))
}

fn checked_max(samples: &[f32]) -> Result<f32> {
    let mut max = 0.0f32;
    for &value in samples {
        if !value.is_finite() || value < 0.0 {
            return Err(PolarityError::UnsupportedImage(format!(
                "pixel values must be finite and non-negative, found {value}"
            )));
        }
        max = max.max(value);
    }
    Ok(max)
}
