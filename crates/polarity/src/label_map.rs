use std::collections::BTreeSet;

use image::Luma;
use imageproc::definitions::Image;

use crate::{region::Region, types::Phenotype};

/// Per-image map of every stamped cell.
///
/// Labels start at 1 and grow with each stamp. A pixel keeps the label of the
/// last cell written over it, so once covered it is never 0 again. Retired
/// labels keep their pixels in [`CombinedLabelMap::get`] but no longer count
/// as coverage.
#[derive(Debug, Clone)]
pub struct CombinedLabelMap {
    labels: Image<Luma<u32>>,
    phenotypes: Vec<Phenotype>,
    retired: BTreeSet<u32>,
}

impl CombinedLabelMap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            labels: Image::new(width, height),
            phenotypes: Vec::new(),
            retired: BTreeSet::new(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.labels.dimensions()
    }

    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.labels.get_pixel(x, y)[0]
    }

    pub fn as_image(&self) -> &Image<Luma<u32>> {
        &self.labels
    }

    /// Label the next stamp will receive
    pub fn next_label(&self) -> u32 {
        self.phenotypes.len() as u32 + 1
    }

    /// Number of stamps so far
    pub fn stamp_count(&self) -> usize {
        self.phenotypes.len()
    }

    /// Write `region` with a fresh label, overwriting earlier owners.
    pub fn stamp(&mut self, region: &Region, phenotype: Phenotype) -> u32 {
        let label = self.next_label();
        for &(x, y) in region.pixels() {
            self.labels.put_pixel(x, y, Luma([label]));
        }
        self.phenotypes.push(phenotype);
        label
    }

    /// Phenotype of a live label; `None` for 0, unknown or retired labels
    pub fn phenotype_of(&self, label: u32) -> Option<Phenotype> {
        if self.retired.contains(&label) {
            return None;
        }
        let index = label.checked_sub(1)? as usize;
        self.phenotypes.get(index).copied()
    }

    /// Drop `labels` from coverage, e.g. when their records were superseded.
    pub fn retire<I: IntoIterator<Item = u32>>(&mut self, labels: I) {
        self.retired.extend(labels);
    }

    pub fn is_retired(&self, label: u32) -> bool {
        self.retired.contains(&label)
    }

    /// Labels currently owning at least one pixel of `region`
    pub fn labels_under(&self, region: &Region) -> BTreeSet<u32> {
        region
            .pixels()
            .iter()
            .map(|&(x, y)| self.get(x, y))
            .filter(|&label| label != 0)
            .collect()
    }

    pub fn overlaps(&self, region: &Region) -> bool {
        region.pixels().iter().any(|&(x, y)| self.get(x, y) != 0)
    }

    /// Pixels owned by a live label as `(x, y, label)`
    pub fn covered(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        self.labels
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] != 0 && !self.retired.contains(&p[0]))
            .map(|(x, y, p)| (x, y, p[0]))
    }

    pub fn covered_area(&self) -> usize {
        self.covered().count()
    }

    /// Pixels whose final owner has `phenotype`
    pub fn phenotype_area(&self, phenotype: Phenotype) -> usize {
        self.covered()
            .filter(|&(_, _, label)| self.phenotype_of(label) == Some(phenotype))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(label: u32, x0: u32, x1: u32, y0: u32, y1: u32) -> Region {
        let pixels = (y0..y1).flat_map(|y| (x0..x1).map(move |x| (x, y))).collect();
        Region::new(label, pixels).expect("Should build region")
    }

    #[test]
    fn stamps_get_increasing_labels() {
        let mut map = CombinedLabelMap::new(10, 10);
        assert_eq!(map.stamp(&rect(7, 0, 2, 0, 2), Phenotype::ApicalIn), 1);
        assert_eq!(map.stamp(&rect(7, 5, 7, 5, 7), Phenotype::ApicalOut), 2);
        assert_eq!(map.next_label(), 3);
        assert_eq!(map.phenotype_of(2), Some(Phenotype::ApicalOut));
        assert_eq!(map.phenotype_of(0), None);
        assert_eq!(map.covered_area(), 8);
    }

    #[test]
    fn overlap_is_last_write_wins() {
        let mut map = CombinedLabelMap::new(10, 10);
        map.stamp(&rect(1, 0, 4, 0, 4), Phenotype::ApicalIn);
        let second = rect(1, 2, 6, 2, 6);
        assert!(map.overlaps(&second));
        assert_eq!(map.labels_under(&second).into_iter().collect::<Vec<_>>(), vec![1]);

        map.stamp(&second, Phenotype::ApicalOut);
        assert_eq!(map.get(3, 3), 2);
        assert_eq!(map.get(0, 0), 1);
        assert_eq!(map.phenotype_area(Phenotype::ApicalOut), 16);
        assert_eq!(map.phenotype_area(Phenotype::ApicalIn), 12);
        assert_eq!(map.covered_area(), 28);
    }

    #[test]
    fn retired_labels_leave_coverage() {
        let mut map = CombinedLabelMap::new(10, 10);
        map.stamp(&rect(1, 0, 6, 0, 4), Phenotype::ApicalIn);
        let smaller = rect(1, 0, 3, 0, 4);
        let superseded = map.labels_under(&smaller);
        map.retire(superseded);
        map.stamp(&smaller, Phenotype::ApicalOut);

        assert!(map.is_retired(1));
        assert_eq!(map.phenotype_of(1), None);
        // leftover pixels keep their raw label
        assert_eq!(map.get(5, 0), 1);
        assert_eq!(map.covered_area(), 12);
        assert_eq!(map.phenotype_area(Phenotype::ApicalIn), 0);
        assert_eq!(map.phenotype_area(Phenotype::ApicalOut), 12);
    }
}
