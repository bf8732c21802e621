use crate::{
    algorithms::ClassifiedCell,
    error::Result,
    region::Region,
    types::{BinaryMask, GrayscaleImage},
};

/// Trait for global foreground/background separation
pub trait MaskThreshold: Send + Sync {
    /// Produce the foreground mask of a grayscale image
    fn threshold(&self, image: &GrayscaleImage) -> Result<BinaryMask>;
}

/// Trait for binary mask transforms (hole filling, morphology, filtering)
pub trait MaskOperation: Send + Sync {
    /// Apply the operation, returning a new mask of the same dimensions
    fn apply(&self, mask: &BinaryMask) -> BinaryMask;
}

/// Trait for per-region polarity decisions
pub trait RegionClassifier: Send + Sync {
    /// Classify one candidate region found at `area_threshold`.
    ///
    /// Returns `None` when the region is rejected.
    fn classify(
        &self,
        region: &Region,
        image: &GrayscaleImage,
        area_threshold: u32,
    ) -> Option<ClassifiedCell>;
}
