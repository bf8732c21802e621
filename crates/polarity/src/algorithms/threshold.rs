use std::collections::HashSet;

use imageproc::region_labelling::Connectivity;

use crate::{
    error::Result,
    region::LabelMap,
    traits::{MaskOperation, MaskThreshold},
    types::{BinaryMask, GrayscaleImage},
};

/// Global Otsu threshold on the 8-bit quantized image.
///
/// Bins span the fixed [0, 1] range rather than the image's own min..max, so
/// images with a high intensity floor get a coarser level. A flat image has
/// no foreground.
#[derive(Debug, Clone, Default)]
pub struct OtsuThreshold;

impl MaskThreshold for OtsuThreshold {
    fn threshold(&self, image: &GrayscaleImage) -> Result<BinaryMask> {
        let quantized = image.to_luma8();
        let mut values = quantized.pixels().map(|p| p[0]);
        let first = values.next();
        if values.all(|v| Some(v) == first) {
            tracing::debug!("single occupied histogram bin, no foreground");
            return Ok(BinaryMask::new(image.width(), image.height()));
        }
        let level = imageproc::contrast::otsu_level(&quantized);
        tracing::debug!(level, "otsu level");
        Ok(BinaryMask::from_fn(image.width(), image.height(), |x, y| {
            quantized.get_pixel(x, y)[0] > level
        }))
    }
}

/// Fixed threshold on normalized intensity
#[derive(Debug, Clone)]
pub struct FixedThreshold {
    pub level: f32,
}

impl Default for FixedThreshold {
    fn default() -> Self {
        Self { level: 0.5 }
    }
}

impl MaskThreshold for FixedThreshold {
    fn threshold(&self, image: &GrayscaleImage) -> Result<BinaryMask> {
        Ok(BinaryMask::from_fn(image.width(), image.height(), |x, y| {
            image.intensity(x, y) > self.level
        }))
    }
}

/// Fills background pockets that have no 4-connected path to the image border
#[derive(Debug, Clone, Default)]
pub struct FillHoles;

impl MaskOperation for FillHoles {
    fn apply(&self, mask: &BinaryMask) -> BinaryMask {
        fill_holes(mask)
    }
}

/// Drops 4-connected components smaller than `min_size` pixels
#[derive(Debug, Clone)]
pub struct RemoveSmallObjects {
    pub min_size: u32,
}

impl MaskOperation for RemoveSmallObjects {
    fn apply(&self, mask: &BinaryMask) -> BinaryMask {
        remove_small_objects(mask, self.min_size)
    }
}

pub fn fill_holes(mask: &BinaryMask) -> BinaryMask {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return mask.clone();
    }

    let background = LabelMap::label(&mask.invert(), Connectivity::Four);
    let mut open: HashSet<u32> = HashSet::new();
    for x in 0..width {
        open.insert(background.get(x, 0));
        open.insert(background.get(x, height - 1));
    }
    for y in 0..height {
        open.insert(background.get(0, y));
        open.insert(background.get(width - 1, y));
    }

    BinaryMask::from_fn(width, height, |x, y| {
        mask.get(x, y) || !open.contains(&background.get(x, y))
    })
}

pub fn remove_small_objects(mask: &BinaryMask, min_size: u32) -> BinaryMask {
    let labels = LabelMap::label(mask, Connectivity::Four);
    let areas = labels.areas();
    BinaryMask::from_fn(mask.width(), mask.height(), |x, y| {
        let label = labels.get(x, y);
        label != 0 && areas.get(&label).is_some_and(|&area| area >= min_size as usize)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_grayscale, SourceImage};
    use crate::types::FloatImage;
    use image::Luma;

    fn ring_mask(size: u32, x0: u32, x1: u32) -> BinaryMask {
        BinaryMask::from_fn(size, size, |x, y| {
            let inside = x >= x0 && x < x1 && y >= x0 && y < x1;
            let interior = x > x0 && x < x1 - 1 && y > x0 && y < x1 - 1;
            inside && !interior
        })
    }

    #[test]
    fn otsu_separates_bright_square() {
        let buffer = FloatImage::from_fn(20, 20, |x, y| {
            Luma([if (5..15).contains(&x) && (5..15).contains(&y) { 1.0 } else { 0.0 }])
        });
        let gray = load_grayscale(&SourceImage::SingleChannel(buffer)).expect("Should load");
        let mask = OtsuThreshold.threshold(&gray).expect("Should threshold");
        assert_eq!(mask.count(), 100);
        assert!(mask.get(5, 5) && !mask.get(4, 5));
    }

    #[test]
    fn flat_image_has_no_foreground() {
        let buffer = FloatImage::from_fn(100, 40, |_, _| Luma([0.6]));
        let gray = load_grayscale(&SourceImage::SingleChannel(buffer)).expect("Should load");
        let mask = OtsuThreshold.threshold(&gray).expect("Should threshold");
        assert!(mask.is_empty());
        assert_eq!(mask.dimensions(), (100, 40));
    }

    #[test]
    fn enclosed_background_is_filled() {
        let ring = ring_mask(20, 5, 15);
        assert_eq!(ring.count(), 36);
        let filled = fill_holes(&ring);
        assert_eq!(filled.count(), 100);
    }

    #[test]
    fn filled_pixels_come_from_mask_or_enclosure() {
        // U-shape open to the top border: nothing to fill
        let cup = BinaryMask::from_fn(10, 10, |x, y| {
            (x == 2 || x == 7) && y < 8 || (y == 7 && (2..=7).contains(&x))
        });
        assert_eq!(fill_holes(&cup), cup);
    }

    #[test]
    fn small_objects_are_removed() {
        let mask = BinaryMask::from_fn(20, 10, |x, y| {
            (x < 3 && y < 3) || ((8..16).contains(&x) && (2..8).contains(&y))
        });
        let cleaned = remove_small_objects(&mask, 10);
        assert_eq!(cleaned.count(), 48);
        assert!(!cleaned.get(0, 0));
        // threshold equal to the component size keeps it
        assert_eq!(remove_small_objects(&mask, 9).count(), 57);
        assert!(remove_small_objects(&mask, 100).is_empty());
    }
}
