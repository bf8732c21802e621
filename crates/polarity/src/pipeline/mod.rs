pub mod builder;

use image::DynamicImage;
use imageproc::region_labelling::Connectivity;
use tracing::{debug, info};

use crate::{
    algorithms::{ClassifiedCell, ConvexHullSummary, HullNormalizer, PhenotypeCounts, Segmenter},
    config::{AnalysisConfig, DetectionPolicy, EmitMode},
    error::{PolarityError, Result},
    io::ImageReport,
    label_map::CombinedLabelMap,
    region::LabelMap,
    traits::{MaskThreshold, RegionClassifier},
    types::{BinaryMask, GrayscaleImage, Phenotype},
};

/// A classified cell together with its label in the combined map
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedCell {
    pub id: u32,
    pub cell: ClassifiedCell,
}

/// Everything the sweep produced for one image
#[derive(Debug, Clone)]
pub struct ImageAnalysis {
    pub cells: Vec<DetectedCell>,
    pub hull: Option<ConvexHullSummary>,
    pub labels: CombinedLabelMap,
}

impl ImageAnalysis {
    pub fn counts(&self) -> PhenotypeCounts {
        PhenotypeCounts::from_phenotypes(self.cells.iter().map(|c| c.cell.phenotype))
    }
}

/// Multi-threshold segmentation and classification pipeline.
///
/// A pipeline holds only immutable configuration; every call to
/// [`Pipeline::classify_cells`] owns its own [`CombinedLabelMap`], so one
/// pipeline can serve many images concurrently.
pub struct Pipeline {
    config: AnalysisConfig,
    threshold: Box<dyn MaskThreshold>,
    classifier: Box<dyn RegionClassifier>,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    /// Validated pipeline with the default Otsu threshold and polarity classifier
    pub fn from_config(config: AnalysisConfig) -> Result<Self> {
        builder::PipelineBuilder::from_config(config).build()
    }

    pub(crate) fn new(
        config: AnalysisConfig,
        threshold: Box<dyn MaskThreshold>,
        classifier: Box<dyn RegionClassifier>,
    ) -> Self {
        Self {
            config,
            threshold,
            classifier,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Sweep the configured area thresholds over one image.
    pub fn classify_cells(&self, image: &GrayscaleImage) -> Result<ImageAnalysis> {
        let segmenter = Segmenter::prepare(image, self.threshold.as_ref(), self.config.segmentation)?;
        let (width, height) = image.dimensions();
        let mut labels = CombinedLabelMap::new(width, height);
        let mut cells: Vec<DetectedCell> = Vec::new();

        for &area_threshold in &self.config.area_thresholds {
            let Some(candidates) = segmenter.segment(area_threshold) else {
                debug!(area_threshold, "no foreground left after small-object removal");
                continue;
            };

            let regions = candidates.regions();
            let mut recorded = 0usize;
            for region in &regions {
                let Some(cell) = self.classifier.classify(region, image, area_threshold) else {
                    continue;
                };
                if self.config.emit == EmitMode::ApicalOutOnly && cell.phenotype == Phenotype::ApicalIn {
                    continue;
                }

                match self.config.detection_policy {
                    DetectionPolicy::RecordEveryPass => {}
                    DetectionPolicy::FirstDetectionWins => {
                        if labels.overlaps(&cell.region) {
                            debug!(area_threshold, "cell already detected at an earlier pass");
                            continue;
                        }
                    }
                    DetectionPolicy::LastDetectionWins => {
                        let superseded = labels.labels_under(&cell.region);
                        if !superseded.is_empty() {
                            debug!(area_threshold, superseded = superseded.len(), "replacing earlier detections");
                            cells.retain(|detected| !superseded.contains(&detected.id));
                            labels.retire(superseded);
                        }
                    }
                }

                let id = labels.stamp(&cell.region, cell.phenotype);
                cells.push(DetectedCell { id, cell });
                recorded += 1;
            }
            debug!(area_threshold, regions = regions.len(), recorded, "pass complete");
        }

        let counts = PhenotypeCounts::from_phenotypes(cells.iter().map(|c| c.cell.phenotype));
        let hull = HullNormalizer.summarize(&labels, counts);
        info!(
            cells = cells.len(),
            apical_in = counts.apical_in,
            apical_out = counts.apical_out,
            hull_area = hull.as_ref().map(|h| h.hull_area),
            "image analysed"
        );

        Ok(ImageAnalysis { cells, hull, labels })
    }

    /// Normalize a decoded image and run the sweep on it.
    pub fn analyze_dynamic(&self, image: &DynamicImage) -> Result<ImageAnalysis> {
        let gray = GrayscaleImage::from_dynamic(image)?;
        self.classify_cells(&gray)
    }

    /// Load, sweep and flatten one decoded image into records.
    pub fn process_dynamic(&self, name: &str, image: &DynamicImage) -> Result<ImageReport> {
        let analysis = self.analyze_dynamic(image)?;
        Ok(ImageReport::new(name, &analysis))
    }

    /// Classify the 8-connected regions of an externally supplied mask,
    /// skipping segmentation entirely.
    pub fn classify_mask(&self, image: &GrayscaleImage, mask: &BinaryMask) -> Result<Vec<ClassifiedCell>> {
        if mask.dimensions() != image.dimensions() {
            return Err(PolarityError::DimensionMismatch {
                expected: image.dimensions(),
                actual: mask.dimensions(),
            });
        }
        let area_threshold = self.config.acceptance.min_area.unwrap_or(1);
        Ok(LabelMap::label(mask, Connectivity::Eight)
            .regions()
            .iter()
            .filter_map(|region| self.classifier.classify(region, image, area_threshold))
            .collect())
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!(
            "Pipeline: {} area thresholds, emit {}, policy {}",
            self.config.area_thresholds.len(),
            self.config.emit,
            self.config.detection_policy
        )
    }
}

/// Run the full sweep with `area_thresholds` replacing the configured list.
pub fn classify_cells(
    image: &GrayscaleImage,
    area_thresholds: &[u32],
    config: &AnalysisConfig,
) -> Result<ImageAnalysis> {
    let config = AnalysisConfig {
        area_thresholds: area_thresholds.to_vec(),
        ..config.clone()
    };
    Pipeline::from_config(config)?.classify_cells(image)
}
