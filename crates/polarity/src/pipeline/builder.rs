use crate::{
    algorithms::{ClassifierParams, OtsuThreshold, PolarityClassifier},
    config::{AnalysisConfig, DetectionPolicy, EmitMode},
    error::Result,
    pipeline::Pipeline,
    traits::{MaskThreshold, RegionClassifier},
};

/// Builder for creating analysis pipelines with a fluent API
pub struct PipelineBuilder {
    config: AnalysisConfig,
    threshold: Option<Box<dyn MaskThreshold>>,
    classifier: Option<Box<dyn RegionClassifier>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self::from_config(AnalysisConfig::default())
    }

    /// Start from an existing configuration
    pub fn from_config(config: AnalysisConfig) -> Self {
        Self {
            config,
            threshold: None,
            classifier: None,
        }
    }

    /// Area thresholds to sweep, in order
    pub fn area_thresholds<I: IntoIterator<Item = u32>>(mut self, thresholds: I) -> Self {
        self.config.area_thresholds = thresholds.into_iter().collect();
        self
    }

    pub fn closing_radius(mut self, radius: u32) -> Self {
        self.config.segmentation.closing_radius = radius;
        self
    }

    pub fn dilation_radius(mut self, radius: u32) -> Self {
        self.config.segmentation.dilation_radius = radius;
        self
    }

    /// Fixed minimum region area instead of the pass threshold
    pub fn min_area(mut self, min_area: u32) -> Self {
        self.config.acceptance.min_area = Some(min_area);
        self
    }

    pub fn eccentricity_threshold(mut self, threshold: f64) -> Self {
        self.config.acceptance.eccentricity_threshold = threshold;
        self
    }

    pub fn high_intensity_fraction(mut self, fraction: f64) -> Self {
        self.config.classification.high_intensity_fraction = fraction;
        self
    }

    pub fn distance_ratio_threshold(mut self, threshold: f64) -> Self {
        self.config.classification.distance_ratio_threshold = threshold;
        self
    }

    pub fn emit(mut self, emit: EmitMode) -> Self {
        self.config.emit = emit;
        self
    }

    pub fn detection_policy(mut self, policy: DetectionPolicy) -> Self {
        self.config.detection_policy = policy;
        self
    }

    /// Set the foreground threshold (replaces Otsu)
    pub fn set_threshold<T>(mut self, threshold: T) -> Self
    where
        T: MaskThreshold + 'static,
    {
        self.threshold = Some(Box::new(threshold));
        self
    }

    /// Set the region classifier (replaces the distance-ratio classifier)
    pub fn set_classifier<C>(mut self, classifier: C) -> Self
    where
        C: RegionClassifier + 'static,
    {
        self.classifier = Some(Box::new(classifier));
        self
    }

    /// Validate the configuration and build the pipeline with default
    /// components where none were set
    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;

        let threshold = self.threshold.unwrap_or_else(|| Box::new(OtsuThreshold));

        let params = ClassifierParams {
            acceptance: self.config.acceptance,
            classification: self.config.classification,
        };
        let classifier = self
            .classifier
            .unwrap_or_else(|| Box::new(PolarityClassifier::new(params)));

        Ok(Pipeline::new(self.config, threshold, classifier))
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
