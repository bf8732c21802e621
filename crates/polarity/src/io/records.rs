use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{algorithms::ConvexHullSummary, pipeline::ImageAnalysis, types::Phenotype};

/// One classified cell, flattened for tabular output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CellRecord {
    pub image_name: String,
    pub cell_id: u32,
    pub area_threshold: u32,
    pub total_area: usize,
    pub phenotype: Phenotype,
    pub distance_ratio: f64,
}

/// Hull normalization of one image, flattened for tabular output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HullRecord {
    pub image_name: String,
    pub convex_hull_area: f64,
    pub apical_out_count: usize,
    pub apical_out_area: usize,
    pub apical_out_ratio: f64,
    pub apical_in_count: usize,
    pub apical_in_area: usize,
    pub apical_in_ratio: f64,
    pub union_area: usize,
    pub union_ratio: f64,
}

impl HullRecord {
    pub fn new(image_name: &str, summary: &ConvexHullSummary) -> Self {
        Self {
            image_name: image_name.to_string(),
            convex_hull_area: summary.hull_area,
            apical_out_count: summary.apical_out.count,
            apical_out_area: summary.apical_out.area,
            apical_out_ratio: summary.apical_out.ratio,
            apical_in_count: summary.apical_in.count,
            apical_in_area: summary.apical_in.area,
            apical_in_ratio: summary.apical_in.ratio,
            union_area: summary.union_area,
            union_ratio: summary.union_ratio,
        }
    }
}

/// Records produced for one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageReport {
    pub image_name: String,
    pub cells: Vec<CellRecord>,
    pub hull: Option<HullRecord>,
}

impl ImageReport {
    pub fn new(image_name: &str, analysis: &ImageAnalysis) -> Self {
        let cells = analysis
            .cells
            .iter()
            .map(|detected| CellRecord {
                image_name: image_name.to_string(),
                cell_id: detected.id,
                area_threshold: detected.cell.area_threshold,
                total_area: detected.cell.area(),
                phenotype: detected.cell.phenotype,
                distance_ratio: detected.cell.distance_ratio(),
            })
            .collect();

        Self {
            image_name: image_name.to_string(),
            cells,
            hull: analysis.hull.as_ref().map(|summary| HullRecord::new(image_name, summary)),
        }
    }
}

/// Totals across every image of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BatchSummary {
    pub images: usize,
    pub total_apical_in: usize,
    pub total_apical_out: usize,
    /// Mean of the per-image ratios over images with a hull
    pub mean_apical_in_ratio: f64,
    pub mean_apical_out_ratio: f64,
}

impl BatchSummary {
    pub fn from_records(cells: &[CellRecord], hulls: &[HullRecord], images: usize) -> Self {
        let count = |phenotype| cells.iter().filter(|c| c.phenotype == phenotype).count();
        let mean = |ratio: fn(&HullRecord) -> f64| {
            if hulls.is_empty() {
                0.0
            } else {
                hulls.iter().map(ratio).sum::<f64>() / hulls.len() as f64
            }
        };

        Self {
            images,
            total_apical_in: count(Phenotype::ApicalIn),
            total_apical_out: count(Phenotype::ApicalOut),
            mean_apical_in_ratio: mean(|h| h.apical_in_ratio),
            mean_apical_out_ratio: mean(|h| h.apical_out_ratio),
        }
    }
}
