use std::collections::BTreeMap;

use image::Luma;
use imageproc::definitions::Image;
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::types::BinaryMask;

/// Inclusive pixel bounds of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    /// Grow by `margin` pixels on every side, clipped to a `width` x `height` frame.
    pub fn expanded(&self, margin: u32, width: u32, height: u32) -> Self {
        Self {
            min_x: self.min_x.saturating_sub(margin),
            min_y: self.min_y.saturating_sub(margin),
            max_x: (self.max_x + margin).min(width.saturating_sub(1)),
            max_y: (self.max_y + margin).min(height.saturating_sub(1)),
        }
    }
}

/// A connected set of foreground pixels from one label map.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    label: u32,
    pixels: Vec<(u32, u32)>,
    bbox: BoundingBox,
}

impl Region {
    /// Builds a region from its pixels. Returns `None` for an empty pixel set.
    pub fn new(label: u32, pixels: Vec<(u32, u32)>) -> Option<Self> {
        let (&(x0, y0), rest) = pixels.split_first()?;
        let mut bbox = BoundingBox { min_x: x0, min_y: y0, max_x: x0, max_y: y0 };
        for &(x, y) in rest {
            bbox.min_x = bbox.min_x.min(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_x = bbox.max_x.max(x);
            bbox.max_y = bbox.max_y.max(y);
        }
        Some(Self { label, pixels, bbox })
    }

    /// Treats every foreground pixel of `mask` as one region, e.g. a manually
    /// drawn outline from another tool.
    pub fn from_mask(label: u32, mask: &BinaryMask) -> Option<Self> {
        Self::new(label, mask.foreground().collect())
    }

    pub fn label(&self) -> u32 {
        self.label
    }

    pub fn pixels(&self) -> &[(u32, u32)] {
        &self.pixels
    }

    pub fn area(&self) -> usize {
        self.pixels.len()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    pub fn centroid(&self) -> [f64; 2] {
        let n = self.pixels.len() as f64;
        let (sx, sy) = self
            .pixels
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x as f64, sy + y as f64));
        [sx / n, sy / n]
    }

    /// Eccentricity of the ellipse with the same second central moments.
    ///
    /// 0 for a circle (or a single pixel), approaching 1 as the region elongates.
    pub fn eccentricity(&self) -> f64 {
        let [cx, cy] = self.centroid();
        let n = self.pixels.len() as f64;
        let (mut a, mut b, mut c) = (0.0, 0.0, 0.0);
        for &(x, y) in &self.pixels {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            a += dx * dx;
            b += dx * dy;
            c += dy * dy;
        }
        a /= n;
        b /= n;
        c /= n;

        let half_trace = (a + c) / 2.0;
        let spread = (((a - c) / 2.0).powi(2) + b * b).sqrt();
        let major = half_trace + spread;
        let minor = (half_trace - spread).max(0.0);
        if major <= 0.0 {
            return 0.0;
        }
        (1.0 - minor / major).max(0.0).sqrt()
    }

    /// Local mask of the region over `frame`, row-major.
    pub(crate) fn mask_in(&self, frame: &BoundingBox) -> Vec<bool> {
        let width = frame.width() as usize;
        let mut mask = vec![false; width * frame.height() as usize];
        for &(x, y) in &self.pixels {
            if x < frame.min_x || y < frame.min_y || x > frame.max_x || y > frame.max_y {
                continue;
            }
            let index = (y - frame.min_y) as usize * width + (x - frame.min_x) as usize;
            mask[index] = true;
        }
        mask
    }
}

/// Integer label image where 0 is background.
#[derive(Debug, Clone)]
pub struct LabelMap {
    labels: Image<Luma<u32>>,
}

impl LabelMap {
    /// Label connected foreground components of `mask`.
    pub fn label(mask: &BinaryMask, connectivity: Connectivity) -> Self {
        let labels = connected_components(&mask.to_gray_image(), connectivity, Luma([0u8]));
        Self { labels }
    }

    pub fn from_image(labels: Image<Luma<u32>>) -> Self {
        Self { labels }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.labels.dimensions()
    }

    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.labels.get_pixel(x, y)[0]
    }

    pub fn as_image(&self) -> &Image<Luma<u32>> {
        &self.labels
    }

    /// Pixel count of every non-zero label
    pub fn areas(&self) -> BTreeMap<u32, usize> {
        let mut areas = BTreeMap::new();
        for pixel in self.labels.pixels() {
            if pixel[0] != 0 {
                *areas.entry(pixel[0]).or_insert(0) += 1;
            }
        }
        areas
    }

    /// All regions in ascending label order
    pub fn regions(&self) -> Vec<Region> {
        let mut pixels: BTreeMap<u32, Vec<(u32, u32)>> = BTreeMap::new();
        for (x, y, pixel) in self.labels.enumerate_pixels() {
            if pixel[0] != 0 {
                pixels.entry(pixel[0]).or_default().push((x, y));
            }
        }
        pixels
            .into_iter()
            .filter_map(|(label, points)| Region::new(label, points))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_mask(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> BinaryMask {
        BinaryMask::from_fn(width, height, |x, y| x >= x0 && x < x1 && y >= y0 && y < y1)
    }

    #[test]
    fn disk_has_near_zero_eccentricity() {
        let mask = BinaryMask::from_fn(41, 41, |x, y| {
            let dx = x as f64 - 20.0;
            let dy = y as f64 - 20.0;
            dx * dx + dy * dy <= 15.0 * 15.0
        });
        let region = Region::from_mask(1, &mask).expect("Should build region");
        assert!(region.eccentricity() < 0.05, "got {}", region.eccentricity());
    }

    #[test]
    fn elongated_rectangle_is_eccentric() {
        let region = Region::from_mask(1, &rect_mask(60, 20, 5, 5, 45, 15)).expect("Should build region");
        assert!(region.eccentricity() > 0.9);
        assert_eq!(region.area(), 400);
        let bbox = region.bounding_box();
        assert_eq!((bbox.width(), bbox.height()), (40, 10));
    }

    #[test]
    fn single_pixel_has_zero_eccentricity() {
        let region = Region::new(3, vec![(4, 4)]).expect("Should build region");
        assert_eq!(region.eccentricity(), 0.0);
        assert!(Region::new(3, Vec::new()).is_none());
    }

    #[test]
    fn labelling_separates_components() {
        let mut mask = rect_mask(30, 10, 1, 1, 5, 5);
        for (x, y) in rect_mask(30, 10, 10, 2, 20, 8).foreground() {
            mask.set(x, y, true);
        }
        let labels = LabelMap::label(&mask, Connectivity::Eight);
        let regions = labels.regions();
        assert_eq!(regions.len(), 2);
        let mut areas: Vec<_> = regions.iter().map(Region::area).collect();
        areas.sort_unstable();
        assert_eq!(areas, vec![16, 60]);
    }

    #[test]
    fn diagonal_pixels_join_only_with_eight_connectivity() {
        let mut mask = BinaryMask::new(4, 4);
        mask.set(1, 1, true);
        mask.set(2, 2, true);
        assert_eq!(LabelMap::label(&mask, Connectivity::Eight).regions().len(), 1);
        assert_eq!(LabelMap::label(&mask, Connectivity::Four).regions().len(), 2);
    }

    #[test]
    fn expanded_box_is_clipped_to_frame() {
        let bbox = BoundingBox { min_x: 0, min_y: 3, max_x: 9, max_y: 5 };
        let grown = bbox.expanded(1, 10, 20);
        assert_eq!(grown, BoundingBox { min_x: 0, min_y: 2, max_x: 9, max_y: 6 });
    }
}
