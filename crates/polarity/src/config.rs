use std::{fs, path::Path};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::error::{PolarityError, Result};

/// Area thresholds swept by default, largest first.
pub const DEFAULT_AREA_THRESHOLDS: [u32; 7] = [100, 50, 30, 15, 10, 5, 3];

/// Complete set of knobs for one analysis run.
///
/// The value is passed explicitly into the pipeline and threaded down to each
/// stage; nothing in the crate reads process-wide defaults.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minimum component sizes (pixels), processed in the given order
    pub area_thresholds: Vec<u32>,
    pub segmentation: SegmentationParams,
    pub acceptance: AcceptanceParams,
    pub classification: ClassificationParams,
    pub emit: EmitMode,
    pub detection_policy: DetectionPolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            area_thresholds: DEFAULT_AREA_THRESHOLDS.to_vec(),
            segmentation: SegmentationParams::default(),
            acceptance: AcceptanceParams::default(),
            classification: ClassificationParams::default(),
            emit: EmitMode::default(),
            detection_policy: DetectionPolicy::default(),
        }
    }
}

/// Morphological cleanup applied after small-object removal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct SegmentationParams {
    /// Disk radius used for closing
    #[schemars(range(max = 64))]
    pub closing_radius: u32,
    /// Disk radius used for the final dilation
    #[schemars(range(max = 64))]
    pub dilation_radius: u32,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            closing_radius: 10,
            dilation_radius: 3,
        }
    }
}

/// Region acceptance rules applied before classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct AcceptanceParams {
    /// Minimum region area in pixels. `None` uses the current pass's area threshold.
    pub min_area: Option<u32>,
    /// Regions rounder than this are rejected (0 disables the check)
    #[schemars(range(min = 0.0, max = 1.0))]
    pub eccentricity_threshold: f64,
}

impl Default for AcceptanceParams {
    fn default() -> Self {
        Self {
            min_area: None,
            eccentricity_threshold: 0.4,
        }
    }
}

/// Parameters of the distance-ratio decision rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ClassificationParams {
    /// Fraction of the region's peak intensity above which a pixel is "high intensity"
    #[schemars(range(min = 0.0, max = 1.0))]
    pub high_intensity_fraction: f64,
    /// Ratios strictly below this are Apical-out
    #[schemars(range(min = 0.0, max = 1.0))]
    pub distance_ratio_threshold: f64,
}

impl Default for ClassificationParams {
    fn default() -> Self {
        Self {
            high_intensity_fraction: 0.8,
            distance_ratio_threshold: 0.4,
        }
    }
}

/// Which phenotypes the sweep emits.
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmitMode {
    /// Record both Apical-in and Apical-out cells
    #[default]
    Both,
    /// Record Apical-out cells only; Apical-in cells are discarded
    ApicalOutOnly,
}

/// How detections of the same cell at several area thresholds are reconciled.
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DetectionPolicy {
    /// Every pass records its detections independently
    #[default]
    RecordEveryPass,
    /// A detection overlapping an already stamped cell is dropped
    FirstDetectionWins,
    /// A detection replaces the records of earlier cells it overlaps
    LastDetectionWins,
}

impl AnalysisConfig {
    /// Check the configuration before any image is touched.
    pub fn validate(&self) -> Result<()> {
        if self.area_thresholds.is_empty() {
            return Err(PolarityError::InvalidConfig(
                "area_thresholds must contain at least one value".to_string(),
            ));
        }
        if let Some(position) = self.area_thresholds.iter().position(|&a| a == 0) {
            return Err(PolarityError::InvalidConfig(format!(
                "area_thresholds[{position}] must be positive"
            )));
        }
        if self.acceptance.min_area == Some(0) {
            return Err(PolarityError::InvalidConfig(
                "acceptance.min_area must be positive when set".to_string(),
            ));
        }
        check_unit_interval(
            "acceptance.eccentricity_threshold",
            self.acceptance.eccentricity_threshold,
        )?;
        check_unit_interval(
            "classification.high_intensity_fraction",
            self.classification.high_intensity_fraction,
        )?;
        check_unit_interval(
            "classification.distance_ratio_threshold",
            self.classification.distance_ratio_threshold,
        )?;
        Ok(())
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format from the extension and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            other => Err(PolarityError::InvalidConfig(format!(
                "unsupported configuration format: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    /// JSON schema of the configuration
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalysisConfig)
    }
}

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PolarityError::InvalidConfig(format!(
            "{name} must lie in [0, 1], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.area_thresholds, vec![100, 50, 30, 15, 10, 5, 3]);
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let config = AnalysisConfig {
            area_thresholds: vec![100, 0, 5],
            ..AnalysisConfig::default()
        };
        let err = config.validate().expect_err("zero threshold must fail");
        assert!(err.to_string().contains("area_thresholds[1]"));
    }

    #[test]
    fn empty_threshold_list_is_rejected() {
        let config = AnalysisConfig {
            area_thresholds: Vec::new(),
            ..AnalysisConfig::default()
        };
        assert!(matches!(config.validate(), Err(PolarityError::InvalidConfig(_))));
    }

    #[test]
    fn fraction_out_of_range_is_rejected() {
        let mut config = AnalysisConfig::default();
        config.classification.high_intensity_fraction = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_threshold_fails_to_parse() {
        let result = AnalysisConfig::from_toml("area_thresholds = [100, -5]");
        assert!(result.is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = AnalysisConfig::from_toml(
            r#"
            area_thresholds = [100, 50]
            emit = "apical_out_only"

            [classification]
            distance_ratio_threshold = 0.9
            "#,
        )
        .expect("Should parse");

        assert_eq!(config.area_thresholds, vec![100, 50]);
        assert_eq!(config.emit, EmitMode::ApicalOutOnly);
        assert_eq!(config.classification.distance_ratio_threshold, 0.9);
        assert_eq!(config.classification.high_intensity_fraction, 0.8);
        assert_eq!(config.segmentation.closing_radius, 10);
        assert_eq!(config.detection_policy, DetectionPolicy::RecordEveryPass);
    }

    #[test]
    fn json_and_toml_agree() {
        let json = AnalysisConfig::from_json(r#"{"detection_policy": "first_detection_wins"}"#)
            .expect("Should parse");
        let toml = AnalysisConfig::from_toml(r#"detection_policy = "first_detection_wins""#)
            .expect("Should parse");
        assert_eq!(json, toml);
    }

    #[test]
    fn schema_lists_fields() {
        let schema = serde_json::to_value(AnalysisConfig::schema()).expect("Should serialize");
        let properties = &schema["properties"];
        assert!(properties.get("area_thresholds").is_some());
        assert!(properties.get("detection_policy").is_some());
    }
}
