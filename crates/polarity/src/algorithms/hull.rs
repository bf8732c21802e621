use geo::{Area, ConvexHull};
use geo_types::{Coord, MultiPoint, Point};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{label_map::CombinedLabelMap, types::Phenotype};

/// Number of recorded cells of each phenotype
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhenotypeCounts {
    pub apical_in: usize,
    pub apical_out: usize,
}

impl PhenotypeCounts {
    pub fn from_phenotypes<I: IntoIterator<Item = Phenotype>>(phenotypes: I) -> Self {
        phenotypes.into_iter().fold(Self::default(), |mut counts, phenotype| {
            match phenotype {
                Phenotype::ApicalIn => counts.apical_in += 1,
                Phenotype::ApicalOut => counts.apical_out += 1,
            }
            counts
        })
    }

    pub fn get(&self, phenotype: Phenotype) -> usize {
        match phenotype {
            Phenotype::ApicalIn => self.apical_in,
            Phenotype::ApicalOut => self.apical_out,
        }
    }
}

/// Occupancy of one phenotype relative to the hull
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhenotypeCoverage {
    pub count: usize,
    /// Pixels finally owned by cells of this phenotype
    pub area: usize,
    /// `area / hull_area`, clamped to [0, 1]
    pub ratio: f64,
}

/// Convex hull of all stamped pixels of one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvexHullSummary {
    pub hull_area: f64,
    /// Closed exterior ring as `[x, y]` pixel coordinates
    pub hull_vertices: Vec<[f64; 2]>,
    /// Pixels covered by any cell
    pub union_area: usize,
    pub union_ratio: f64,
    pub apical_in: PhenotypeCoverage,
    pub apical_out: PhenotypeCoverage,
}

impl ConvexHullSummary {
    pub fn coverage(&self, phenotype: Phenotype) -> &PhenotypeCoverage {
        match phenotype {
            Phenotype::ApicalIn => &self.apical_in,
            Phenotype::ApicalOut => &self.apical_out,
        }
    }
}

/// Normalizes phenotype areas by the convex hull of the covered pixels
#[derive(Debug, Clone, Default)]
pub struct HullNormalizer;

impl HullNormalizer {
    /// `None` when fewer than three pixels are covered or they are collinear.
    pub fn summarize(
        &self,
        labels: &CombinedLabelMap,
        counts: PhenotypeCounts,
    ) -> Option<ConvexHullSummary> {
        let points: Vec<Point<f64>> = labels
            .covered()
            .map(|(x, y, _)| Point::new(x as f64, y as f64))
            .collect();
        if points.len() < 3 {
            debug!(points = points.len(), "too few covered pixels for a hull");
            return None;
        }

        let union_area = points.len();
        let hull = MultiPoint::new(points).convex_hull();
        let hull_area = hull.unsigned_area();
        if hull_area <= 0.0 {
            debug!("covered pixels are collinear, no hull area");
            return None;
        }

        let coverage = |phenotype: Phenotype| {
            let area = labels.phenotype_area(phenotype);
            PhenotypeCoverage {
                count: counts.get(phenotype),
                area,
                ratio: clamped_ratio(area, hull_area),
            }
        };

        Some(ConvexHullSummary {
            hull_area,
            hull_vertices: hull
                .exterior()
                .coords()
                .map(|&Coord { x, y }| [x, y])
                .collect(),
            union_area,
            union_ratio: clamped_ratio(union_area, hull_area),
            apical_in: coverage(Phenotype::ApicalIn),
            apical_out: coverage(Phenotype::ApicalOut),
        })
    }
}

fn clamped_ratio(area: usize, hull_area: f64) -> f64 {
    (area as f64 / hull_area).clamp(0.0, 1.0)
}
