use polarity::{AnalysisConfig, PolarityError};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolarityCliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Analysis(#[from] PolarityError),
    #[error("Job lists no images")]
    NoImages,
    #[error("Image name '{0}' appears more than once")]
    DuplicateImageName(String),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// One image to analyse
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ImageEntry {
    /// Name used in every record of this image
    pub name: String,
    pub path: PathBuf,
}

/// Batch job configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AnalysisJob {
    pub images: Vec<ImageEntry>,
    /// Results document path
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Directory receiving one GeoJSON file per image
    #[serde(default)]
    pub geojson_dir: Option<PathBuf>,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

fn default_output() -> PathBuf {
    PathBuf::from("polarity_results.json")
}

impl AnalysisJob {
    /// Check the job before any image is decoded
    pub fn validate(&self) -> Result<(), PolarityCliError> {
        if self.images.is_empty() {
            return Err(PolarityCliError::NoImages);
        }
        let mut seen = HashSet::new();
        if let Some(entry) = self.images.iter().find(|entry| !seen.insert(entry.name.as_str())) {
            return Err(PolarityCliError::DuplicateImageName(entry.name.clone()));
        }
        self.analysis.validate()?;
        Ok(())
    }

    /// Load job configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, PolarityCliError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load job configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, PolarityCliError> {
        Ok(toml::from_str(content)?)
    }

    /// Load job configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, PolarityCliError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load job configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self, PolarityCliError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PolarityCliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(PolarityCliError::UnsupportedFileFormat),
        }
    }

    /// Convert the job to a TOML string
    pub fn to_toml(&self) -> Result<String, PolarityCliError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Convert the job to a JSON string
    pub fn to_json(&self) -> Result<String, PolarityCliError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    /// GeoJSON path for one image, when export is enabled
    pub fn geojson_path(&self, image_name: &str) -> Option<PathBuf> {
        self.geojson_dir
            .as_ref()
            .map(|dir| dir.join(format!("{image_name}.geojson")))
    }
}
