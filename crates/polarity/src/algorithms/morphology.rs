//! Binary morphology with disk footprints.
//!
//! A disk of radius `r` covers the offsets with `dx² + dy² <= r²`. Both
//! operations are evaluated exactly from the squared Euclidean distance
//! transform. Pixels outside the image never take part, so erosion does not
//! eat into regions touching the border.

use imageproc::distance_transform::euclidean_squared_distance_transform;

use crate::{traits::MaskOperation, types::BinaryMask};

/// Dilation by a disk
#[derive(Debug, Clone)]
pub struct DiskDilation {
    pub radius: u32,
}

impl MaskOperation for DiskDilation {
    fn apply(&self, mask: &BinaryMask) -> BinaryMask {
        dilate_disk(mask, self.radius)
    }
}

/// Closing (dilation then erosion) by a disk
#[derive(Debug, Clone)]
pub struct DiskClosing {
    pub radius: u32,
}

impl MaskOperation for DiskClosing {
    fn apply(&self, mask: &BinaryMask) -> BinaryMask {
        close_disk(mask, self.radius)
    }
}

/// Pixels within `radius` of some foreground pixel.
pub fn dilate_disk(mask: &BinaryMask, radius: u32) -> BinaryMask {
    if radius == 0 || mask.is_empty() {
        return mask.clone();
    }
    within_radius(mask, radius)
}

/// Pixels farther than `radius` from every background pixel inside the image.
pub fn erode_disk(mask: &BinaryMask, radius: u32) -> BinaryMask {
    let background = mask.invert();
    if radius == 0 || background.is_empty() {
        return mask.clone();
    }
    within_radius(&background, radius).invert()
}

pub fn close_disk(mask: &BinaryMask, radius: u32) -> BinaryMask {
    erode_disk(&dilate_disk(mask, radius), radius)
}

fn within_radius(mask: &BinaryMask, radius: u32) -> BinaryMask {
    let distances = euclidean_squared_distance_transform(&mask.to_gray_image());
    let limit = f64::from(radius) * f64::from(radius);
    BinaryMask::from_fn(mask.width(), mask.height(), |x, y| {
        distances.get_pixel(x, y)[0] <= limit
    })
}
