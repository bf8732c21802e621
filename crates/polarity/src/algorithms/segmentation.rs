use imageproc::region_labelling::Connectivity;
use tracing::debug;

use crate::{
    algorithms::{
        morphology::{DiskClosing, DiskDilation},
        threshold::{FillHoles, RemoveSmallObjects},
    },
    config::SegmentationParams,
    error::Result,
    region::LabelMap,
    traits::{MaskOperation, MaskThreshold},
    types::{BinaryMask, GrayscaleImage},
};

/// Multi-scale segmenter for one image.
///
/// The thresholded, hole-filled mask is computed once in [`Segmenter::prepare`];
/// each call to [`Segmenter::segment`] only re-runs the cleanup for its area
/// threshold.
#[derive(Debug, Clone)]
pub struct Segmenter {
    filled: BinaryMask,
    params: SegmentationParams,
}

impl Segmenter {
    pub fn prepare(
        image: &GrayscaleImage,
        threshold: &dyn MaskThreshold,
        params: SegmentationParams,
    ) -> Result<Self> {
        let binary = threshold.threshold(image)?;
        let filled = FillHoles.apply(&binary);
        debug!(
            foreground = binary.count(),
            filled = filled.count(),
            "prepared foreground mask"
        );
        Ok(Self { filled, params })
    }

    /// Hole-filled foreground mask shared by every pass
    pub fn filled_mask(&self) -> &BinaryMask {
        &self.filled
    }

    /// Cleaned candidate regions at `area_threshold`, or `None` when small-object
    /// removal leaves nothing.
    pub fn segment(&self, area_threshold: u32) -> Option<LabelMap> {
        let cleaned = RemoveSmallObjects { min_size: area_threshold }.apply(&self.filled);
        if cleaned.is_empty() {
            return None;
        }

        let closing = DiskClosing { radius: self.params.closing_radius };
        let dilation = DiskDilation { radius: self.params.dilation_radius };
        let steps: [&dyn MaskOperation; 2] = [&closing, &dilation];
        let grown = steps.iter().fold(cleaned, |mask, step| step.apply(&mask));

        Some(LabelMap::label(&grown, Connectivity::Eight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::threshold::OtsuThreshold;
    use crate::loader::{load_grayscale, SourceImage};
    use crate::types::FloatImage;
    use image::Luma;

    fn blobs() -> GrayscaleImage {
        // 64-pixel square and a 12x12 square far apart
        let buffer = FloatImage::from_fn(120, 60, |x, y| {
            let small = (10..18).contains(&x) && (10..18).contains(&y);
            let large = (70..82).contains(&x) && (20..32).contains(&y);
            Luma([if small || large { 1.0 } else { 0.0 }])
        });
        load_grayscale(&SourceImage::SingleChannel(buffer)).expect("Should load")
    }

    #[test]
    fn large_threshold_keeps_only_large_blob() {
        let segmenter = Segmenter::prepare(&blobs(), &OtsuThreshold, SegmentationParams::default())
            .expect("Should prepare");
        let labels = segmenter.segment(100).expect("Large blob survives");
        let regions = labels.regions();
        assert_eq!(regions.len(), 1);
        let [cx, cy] = regions[0].centroid();
        assert!((cx - 75.5).abs() < 0.5 && (cy - 25.5).abs() < 0.5);
    }

    #[test]
    fn small_threshold_keeps_both_blobs() {
        let segmenter = Segmenter::prepare(&blobs(), &OtsuThreshold, SegmentationParams::default())
            .expect("Should prepare");
        let labels = segmenter.segment(50).expect("Both blobs survive");
        assert_eq!(labels.regions().len(), 2);
    }

    #[test]
    fn empty_pass_is_skipped() {
        let segmenter = Segmenter::prepare(&blobs(), &OtsuThreshold, SegmentationParams::default())
            .expect("Should prepare");
        assert!(segmenter.segment(1_000).is_none());
    }

    #[test]
    fn dilation_grows_regions() {
        let params = SegmentationParams { closing_radius: 0, dilation_radius: 3 };
        let segmenter = Segmenter::prepare(&blobs(), &OtsuThreshold, params).expect("Should prepare");
        let regions = segmenter.segment(100).expect("Large blob survives").regions();
        // 12x12 square grown by a radius-3 disk
        assert!(regions[0].area() > 144);
        let bbox = regions[0].bounding_box();
        assert_eq!((bbox.width(), bbox.height()), (18, 18));
    }
}
