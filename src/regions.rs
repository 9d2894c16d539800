//! Ordered list of anchors picked off the joint histogram.

use serde::{Deserialize, Serialize};

use crate::histogram::HistogramImage;
use crate::labeler::Region;

/// Regions in pick order; position `i` becomes label `i + 1`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionTable {
    regions: Vec<Region>,
}

impl RegionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, region: Region) {
        self.regions.push(region);
    }

    /// Record a picked point in histogram value space. Values are truncated
    /// to whole numbers, as the pick table stores integers.
    pub fn push_point(&mut self, value_a: f64, value_b: f64) -> Region {
        let region = Region::new(value_a.trunc(), value_b.trunc());
        self.push(region);
        region
    }

    /// Record the value pair under histogram pixel `(col, row)`.
    pub fn push_pixel(&mut self, image: &HistogramImage, col: usize, row: usize) -> Region {
        let (value_a, value_b) = image.value_at(col, row);
        self.push_point(value_a, value_b)
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn as_slice(&self) -> &[Region] {
        &self.regions
    }
}

impl From<Vec<Region>> for RegionTable {
    fn from(regions: Vec<Region>) -> Self {
        Self { regions }
    }
}
