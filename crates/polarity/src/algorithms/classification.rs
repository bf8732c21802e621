use image::{GrayImage, Luma};
use imageproc::distance_transform::euclidean_squared_distance_transform;
use tracing::{debug, trace, warn};

use crate::{
    config::{AcceptanceParams, ClassificationParams},
    region::Region,
    traits::RegionClassifier,
    types::{GrayscaleImage, Phenotype},
};

/// Distance-based polarity metrics of one region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarityMeasurement {
    /// Largest distance from a region pixel to the nearest non-region pixel
    pub max_distance: f64,
    /// Mean distance over the high-intensity pixels (0 when there are none)
    pub mean_high_intensity_distance: f64,
    /// `mean_high_intensity_distance / max_distance`, 0 when either is degenerate
    pub distance_ratio: f64,
    /// Number of pixels above the intensity cutoff
    pub high_intensity_pixels: usize,
}

/// A region accepted and labelled by the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedCell {
    pub region: Region,
    pub eccentricity: f64,
    pub measurement: PolarityMeasurement,
    pub phenotype: Phenotype,
    /// Area threshold of the pass that produced the region
    pub area_threshold: u32,
}

impl ClassifiedCell {
    pub fn area(&self) -> usize {
        self.region.area()
    }

    pub fn distance_ratio(&self) -> f64 {
        self.measurement.distance_ratio
    }
}

/// Acceptance and decision parameters for [`classify_region`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassifierParams {
    pub acceptance: AcceptanceParams,
    pub classification: ClassificationParams,
}

/// Distance-ratio polarity classifier
#[derive(Debug, Clone, Default)]
pub struct PolarityClassifier {
    pub params: ClassifierParams,
}

impl PolarityClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self { params }
    }
}

impl RegionClassifier for PolarityClassifier {
    fn classify(
        &self,
        region: &Region,
        image: &GrayscaleImage,
        area_threshold: u32,
    ) -> Option<ClassifiedCell> {
        let acceptance = &self.params.acceptance;
        let min_area = acceptance.min_area.unwrap_or(area_threshold) as usize;
        if region.area() < min_area {
            trace!(label = region.label(), area = region.area(), min_area, "region too small");
            return None;
        }

        let eccentricity = region.eccentricity();
        if eccentricity < acceptance.eccentricity_threshold {
            trace!(label = region.label(), eccentricity, "region too round");
            return None;
        }

        let bbox = region.bounding_box();
        if bbox.max_x >= image.width() || bbox.max_y >= image.height() {
            warn!(
                label = region.label(),
                dimensions = ?image.dimensions(),
                "region lies outside the image"
            );
            return None;
        }

        let classification = &self.params.classification;
        let measurement = measure_polarity(region, image, classification.high_intensity_fraction);
        let phenotype = if measurement.distance_ratio < classification.distance_ratio_threshold {
            Phenotype::ApicalOut
        } else {
            Phenotype::ApicalIn
        };
        debug!(
            label = region.label(),
            area = region.area(),
            ratio = measurement.distance_ratio,
            %phenotype,
            "classified region"
        );

        Some(ClassifiedCell {
            region: region.clone(),
            eccentricity,
            measurement,
            phenotype,
            area_threshold,
        })
    }
}

/// Classify a single region, e.g. one taken from a hand-drawn mask.
///
/// With `min_area` unset every non-empty region passes the area check.
pub fn classify_region(
    region: &Region,
    image: &GrayscaleImage,
    params: &ClassifierParams,
) -> Option<ClassifiedCell> {
    let threshold = params.acceptance.min_area.unwrap_or(0);
    PolarityClassifier::new(*params).classify(region, image, threshold)
}

/// Compute the distance ratio of `region` against `image`.
///
/// The region must lie inside the image.
pub fn measure_polarity(
    region: &Region,
    image: &GrayscaleImage,
    high_intensity_fraction: f64,
) -> PolarityMeasurement {
    let distances = region_distances(region, image.width(), image.height());
    let max_distance = distances.iter().copied().fold(0.0, f64::max);

    let peak = region
        .pixels()
        .iter()
        .map(|&(x, y)| image.intensity(x, y) as f64)
        .fold(0.0, f64::max);
    let cutoff = high_intensity_fraction * peak;

    let (sum, high_intensity_pixels) = region
        .pixels()
        .iter()
        .zip(&distances)
        .filter(|&(&(x, y), _)| image.intensity(x, y) as f64 > cutoff)
        .fold((0.0, 0usize), |(sum, count), (_, &d)| (sum + d, count + 1));

    let mean_high_intensity_distance = if high_intensity_pixels > 0 {
        sum / high_intensity_pixels as f64
    } else {
        0.0
    };
    let distance_ratio = if high_intensity_pixels > 0 && max_distance > 0.0 {
        (mean_high_intensity_distance / max_distance).clamp(0.0, 1.0)
    } else {
        0.0
    };

    PolarityMeasurement {
        max_distance,
        mean_high_intensity_distance,
        distance_ratio,
        high_intensity_pixels,
    }
}

/// Euclidean distance from each region pixel (in `region.pixels()` order) to
/// the nearest pixel outside the region.
///
/// Only the bounding box grown by one pixel is transformed; every pixel on
/// that ring lies outside the region, so no nearer background can exist
/// beyond it. A region covering the whole image has no background and gets
/// all-zero distances.
pub fn region_distances(region: &Region, width: u32, height: u32) -> Vec<f64> {
    let frame = region.bounding_box().expanded(1, width, height);
    let inside = region.mask_in(&frame);
    if inside.iter().all(|&v| v) {
        return vec![0.0; region.area()];
    }

    let frame_width = frame.width();
    let outside = GrayImage::from_fn(frame_width, frame.height(), |x, y| {
        let index = (y * frame_width + x) as usize;
        Luma([if inside[index] { 0 } else { 255 }])
    });
    let squared = euclidean_squared_distance_transform(&outside);

    region
        .pixels()
        .iter()
        .map(|&(x, y)| squared.get_pixel(x - frame.min_x, y - frame.min_y)[0].sqrt())
        .collect()
}
