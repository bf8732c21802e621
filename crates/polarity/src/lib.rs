//! # Cell Polarity Classification Library
//!
//! Segments cells in fluorescence microscopy images and labels each one
//! Apical-in or Apical-out from where its bright marker sits relative to the
//! cell boundary.
//!
//! ## Core Features
//!
//! - **Multi-scale segmentation**: Otsu thresholding, hole filling and disk
//!   morphology swept over a list of minimum-area thresholds
//! - **Distance-ratio classifier**: mean boundary distance of the brightest
//!   pixels relative to the region's maximum
//! - **Hull normalization**: phenotype areas relative to the convex hull of
//!   every detected cell
//! - **Trait-based stages**: swap the threshold or classifier through the
//!   pipeline builder
//! - **Flat records**: JSON and GeoJSON export of per-cell and per-image results
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use polarity::{GrayscaleImage, ImageReport, Pipeline};
//!
//! let pipeline = Pipeline::builder()
//!     .area_thresholds([100, 50, 30])
//!     .build()?;
//!
//! let image = GrayscaleImage::open("organoids.tif")?;
//! let analysis = pipeline.classify_cells(&image)?;
//! let report = ImageReport::new("organoids", &analysis);
//!
//! analysis.save_geojson("organoids", "organoids.geojson")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Single Regions
//!
//! ```rust,no_run
//! use polarity::{classify_region, BinaryMask, ClassifierParams, GrayscaleImage, Region};
//!
//! let image = GrayscaleImage::open("organoids.tif")?;
//! let mask = BinaryMask::from_gray_image(&image::open("outline.png")?.to_luma8());
//! if let Some(region) = Region::from_mask(1, &mask) {
//!     let cell = classify_region(&region, &image, &ClassifierParams::default());
//!     println!("{:?}", cell.map(|c| c.phenotype));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod config;
pub mod types;
pub mod loader;
pub mod region;
pub mod label_map;
pub mod traits;
pub mod algorithms;
pub mod pipeline;
pub mod io;

// Re-exports for convenience
pub use error::{PolarityError, Result};
pub use config::*;
pub use types::{BinaryMask, FloatImage, GrayscaleImage, Phenotype};
pub use loader::{load_grayscale, SourceImage};
pub use region::{BoundingBox, LabelMap, Region};
pub use label_map::CombinedLabelMap;
pub use traits::*;
pub use algorithms::*;
pub use pipeline::{builder::PipelineBuilder, classify_cells, DetectedCell, ImageAnalysis, Pipeline};
pub use io::{
    BatchSummary, CellRecord, HullRecord, ImageReport, JsonResultSink, MemorySink, ResultSink,
    ResultsDocument,
};

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};

    fn load(image: &DynamicImage) -> GrayscaleImage {
        GrayscaleImage::from_dynamic(image).expect("Should load")
    }

    #[test]
    fn rim_marked_square_is_apical_out() {
        let raw = GrayImage::from_fn(20, 20, |x, y| {
            let inside = (5..15).contains(&x) && (5..15).contains(&y);
            let ring = x == 5 || x == 14 || y == 5 || y == 14;
            Luma([if inside && ring { 255 } else { 0 }])
        });
        let image = load(&DynamicImage::ImageLuma8(raw));
        let mask = BinaryMask::from_fn(20, 20, |x, y| (5..15).contains(&x) && (5..15).contains(&y));
        let region = Region::from_mask(1, &mask).expect("Should build region");
        let params = ClassifierParams {
            acceptance: AcceptanceParams {
                min_area: Some(1),
                eccentricity_threshold: 0.0,
            },
            classification: ClassificationParams {
                high_intensity_fraction: 0.5,
                distance_ratio_threshold: 0.5,
            },
        };
        let cell = classify_region(&region, &image, &params).expect("Should classify");
        assert_eq!(cell.phenotype, Phenotype::ApicalOut);
        assert!(cell.distance_ratio() < 0.5);
    }

    #[test]
    fn end_to_end_records_through_memory_sink() {
        let raw = GrayImage::from_fn(100, 100, |x, y| {
            let bar = (20..80).contains(&x) && (40..60).contains(&y);
            Luma([if bar { 220 } else { 5 }])
        });
        let pipeline = Pipeline::builder()
            .area_thresholds([100, 50])
            .build()
            .expect("Should build");
        let report = pipeline
            .process_dynamic("bar", &DynamicImage::ImageLuma8(raw))
            .expect("Should process");

        let mut sink = MemorySink::default();
        sink.write_report(&report).expect("Should write");
        let summary = sink.finish().expect("Should finish");

        // the bar is found once per pass
        assert_eq!(report.cells.len(), 2);
        assert_eq!(report.cells[0].area_threshold, 100);
        assert_eq!(report.cells[1].area_threshold, 50);
        assert_eq!(summary.total_apical_in + summary.total_apical_out, 2);
        let hull = report.hull.expect("Should have hull");
        assert!(hull.union_ratio <= 1.0);
        assert!(hull.apical_in_ratio + hull.apical_out_ratio <= 1.0 + 1e-12);
    }
}
