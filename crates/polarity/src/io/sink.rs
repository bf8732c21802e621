use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::Result,
    io::records::{BatchSummary, CellRecord, HullRecord, ImageReport},
};

/// Destination for the records of a batch.
///
/// Reports are pushed one image at a time; `finish` is called once after the
/// last image and returns the batch totals.
pub trait ResultSink {
    fn write_report(&mut self, report: &ImageReport) -> Result<()>;

    fn finish(&mut self) -> Result<BatchSummary>;
}

/// Whole-batch results document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsDocument {
    pub cells: Vec<CellRecord>,
    pub hull_summaries: Vec<HullRecord>,
    pub summary: BatchSummary,
}

impl ResultsDocument {
    fn push(&mut self, report: &ImageReport) {
        self.cells.extend(report.cells.iter().cloned());
        self.hull_summaries.extend(report.hull.iter().cloned());
        self.summary.images += 1;
    }

    fn summarize(&mut self) -> BatchSummary {
        self.summary = BatchSummary::from_records(&self.cells, &self.hull_summaries, self.summary.images);
        self.summary.clone()
    }
}

/// Keeps every record in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub document: ResultsDocument,
}

impl ResultSink for MemorySink {
    fn write_report(&mut self, report: &ImageReport) -> Result<()> {
        self.document.push(report);
        Ok(())
    }

    fn finish(&mut self) -> Result<BatchSummary> {
        Ok(self.document.summarize())
    }
}

/// Writes a pretty-printed [`ResultsDocument`] on finish
#[derive(Debug)]
pub struct JsonResultSink {
    path: PathBuf,
    document: ResultsDocument,
}

impl JsonResultSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            document: ResultsDocument::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for JsonResultSink {
    fn write_report(&mut self, report: &ImageReport) -> Result<()> {
        self.document.push(report);
        Ok(())
    }

    fn finish(&mut self) -> Result<BatchSummary> {
        let summary = self.document.summarize();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.document)?)?;
        info!(
            path = %self.path.display(),
            cells = self.document.cells.len(),
            "results written"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Phenotype;

    fn report(name: &str, phenotypes: &[Phenotype], hull_ratio: Option<f64>) -> ImageReport {
        ImageReport {
            image_name: name.to_string(),
            cells: phenotypes
                .iter()
                .enumerate()
                .map(|(i, &phenotype)| CellRecord {
                    image_name: name.to_string(),
                    cell_id: i as u32 + 1,
                    area_threshold: 100,
                    total_area: 200,
                    phenotype,
                    distance_ratio: 0.5,
                })
                .collect(),
            hull: hull_ratio.map(|ratio| HullRecord {
                image_name: name.to_string(),
                convex_hull_area: 400.0,
                apical_out_count: 0,
                apical_out_area: 0,
                apical_out_ratio: 0.0,
                apical_in_count: phenotypes.len(),
                apical_in_area: 200,
                apical_in_ratio: ratio,
                union_area: 200,
                union_ratio: ratio,
            }),
        }
    }

    #[test]
    fn memory_sink_accumulates_images() {
        let mut sink = MemorySink::default();
        sink.write_report(&report("a", &[Phenotype::ApicalIn, Phenotype::ApicalIn], Some(0.5)))
            .expect("Should write");
        sink.write_report(&report("b", &[], None)).expect("Should write");

        let summary = sink.finish().expect("Should finish");
        assert_eq!(summary.images, 2);
        assert_eq!(summary.total_apical_in, 2);
        assert_eq!(sink.document.hull_summaries.len(), 1);
        assert_eq!(summary.mean_apical_in_ratio, 0.5);
    }

    #[test]
    fn json_sink_writes_document() {
        let dir = std::env::temp_dir().join(format!("polarity-sink-{}", std::process::id()));
        let path = dir.join("results.json");
        let mut sink = JsonResultSink::new(&path);
        sink.write_report(&report("a", &[Phenotype::ApicalOut], Some(0.25)))
            .expect("Should write");
        sink.finish().expect("Should finish");

        let written = fs::read_to_string(&path).expect("Should read results");
        let document: ResultsDocument = serde_json::from_str(&written).expect("Should parse");
        assert_eq!(document.cells.len(), 1);
        assert_eq!(document.cells[0].phenotype, Phenotype::ApicalOut);
        assert_eq!(document.summary.total_apical_out, 1);
        fs::remove_dir_all(&dir).expect("Should clean up");
    }
}
