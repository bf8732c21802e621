use image::{GrayImage, ImageBuffer, Luma};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

/// Single-channel float buffer used throughout the crate
pub type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Single-channel image with every value in [0, 1].
///
/// Only the loader produces one; afterwards it is read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayscaleImage {
    buffer: FloatImage,
}

impl GrayscaleImage {
    /// Wraps a buffer whose values are already normalized.
    pub(crate) fn from_normalized(buffer: FloatImage) -> Self {
        Self { buffer }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Intensity at `(x, y)`. Panics when out of bounds.
    pub fn intensity(&self, x: u32, y: u32) -> f32 {
        self.buffer.get_pixel(x, y)[0]
    }

    pub fn as_buffer(&self) -> &FloatImage {
        &self.buffer
    }

    pub fn max_intensity(&self) -> f32 {
        self.buffer.pixels().map(|p| p[0]).fold(0.0, f32::max)
    }

    /// Quantize to 8 bits, rounding to nearest.
    pub fn to_luma8(&self) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            Luma([(self.intensity(x, y) * 255.0).round().clamp(0.0, 255.0) as u8])
        })
    }
}

/// 2-D boolean mask; `true` marks foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl BinaryMask {
    /// All-background mask
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; (width as usize) * (height as usize)],
        }
    }

    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        let mut data = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { width, height, data }
    }

    /// Non-zero pixels become foreground
    pub fn from_gray_image(image: &GrayImage) -> Self {
        Self::from_fn(image.width(), image.height(), |x, y| image.get_pixel(x, y)[0] > 0)
    }

    /// Foreground as 255, background as 0
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.get(x, y) { 255 } else { 0 }])
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let index = self.index(x, y);
        self.data[index] = value;
    }

    /// Number of foreground pixels
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&v| v)
    }

    pub fn invert(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| !v).collect(),
        }
    }

    /// Coordinates of foreground pixels in row-major order
    pub fn foreground(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let width = self.width as usize;
        self.data
            .iter()
            .enumerate()
            .filter(|(_, v)| **v)
            .map(move |(i, _)| ((i % width) as u32, (i / width) as u32))
    }
}

/// Polarity phenotype of a classified cell.
#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq, Hash
)]
pub enum Phenotype {
    /// Bright marker concentrated near the region's center
    #[serde(rename = "Apical-in")]
    #[strum(serialize = "Apical-in")]
    ApicalIn,
    /// Bright marker concentrated near the region's rim
    #[serde(rename = "Apical-out")]
    #[strum(serialize = "Apical-out")]
    ApicalOut,
}
