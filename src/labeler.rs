//! Region labeling over the joint value space of two volumes.
//!
//! Each region is an (A, B) anchor expanded by a shared tolerance into an
//! axis-aligned box. Voxels whose value pair falls inside a box get that
//! region's 1-based index. Regions are applied one full-volume pass at a
//! time in list order, so where boxes overlap the later region wins.

use std::fmt;
use std::str::FromStr;

use crate::enums::Processor;
use crate::error::{DectError, Result};
use crate::volume::{LabelVolume, VolumeSample, Voxel};

use log::{debug, info, warn};
use ndarray::{Array3, Zip};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An anchor picked from the joint histogram.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub value_a: f64,
    pub value_b: f64,
}

impl Region {
    pub fn new(value_a: f64, value_b: f64) -> Self {
        Self { value_a, value_b }
    }

    /// Inclusive box test.
    #[inline]
    pub fn contains(&self, value_a: f64, value_b: f64, tolerance: f64) -> bool {
        value_a >= self.value_a - tolerance
            && value_a <= self.value_a + tolerance
            && value_b >= self.value_b - tolerance
            && value_b <= self.value_b + tolerance
    }

    fn is_finite(&self) -> bool {
        self.value_a.is_finite() && self.value_b.is_finite()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.value_a, self.value_b)
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("expected a region as `A,B`, got `{0}`")]
pub struct ParseRegionError(String);

impl FromStr for Region {
    type Err = ParseRegionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (a, b) = s
            .split_once(',')
            .ok_or_else(|| ParseRegionError(s.to_owned()))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| ParseRegionError(s.to_owned()))
        };
        Ok(Self::new(parse(a)?, parse(b)?))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RegionLabeler {
    processor: Processor,
}

impl RegionLabeler {
    pub fn new(processor: Processor) -> Self {
        Self { processor }
    }

    /// Label every voxel with the index of the last region whose box holds
    /// its (A, B) pair, or 0.
    ///
    /// The result copies the geometry of `a`.
    ///
    /// # Errors
    ///
    /// Fails before allocating the output if the shapes differ, `regions`
    /// is empty or holds a non-finite value, or `tolerance` is negative or
    /// NaN.
    pub fn label<A: Voxel, B: Voxel>(
        &self,
        a: &VolumeSample<A>,
        b: &VolumeSample<B>,
        regions: &[Region],
        tolerance: f64,
    ) -> Result<LabelVolume> {
        a.ensure_same_shape(b)?;
        if regions.is_empty() {
            return Err(DectError::InvalidRegionList("no regions given".into()));
        }
        if let Some(position) = regions.iter().position(|r| !r.is_finite()) {
            return Err(DectError::InvalidRegionList(format!(
                "region {} is not a finite value pair",
                position + 1
            )));
        }
        if regions.len() > u32::MAX as usize {
            return Err(DectError::InvalidRegionList(format!(
                "{} regions exceed the label range",
                regions.len()
            )));
        }
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(DectError::InvalidTolerance(tolerance));
        }

        info!(
            "region labeling: processing started ({} voxels, {} regions, tolerance {})",
            a.voxel_count(),
            regions.len(),
            tolerance
        );

        let mut labels = Array3::<u32>::zeros(a.dim());
        for (position, region) in regions.iter().enumerate() {
            let index = position as u32 + 1;
            let assign = |label: &mut u32, &x: &A, &y: &B| {
                if region.contains(x.to_f64(), y.to_f64(), tolerance) {
                    *label = index;
                }
            };
            let zip = Zip::from(&mut labels).and(&a.data).and(&b.data);
            match self.processor {
                Processor::Serial => zip.for_each(assign),
                Processor::Parallel => zip.par_for_each(assign),
            }
        }

        let labels = LabelVolume::new(labels, a.geometry);
        let counts = labels.label_counts(regions.len());
        for (position, region) in regions.iter().enumerate() {
            debug!(
                "region {} ({}): {} voxels",
                position + 1,
                region,
                counts[position + 1]
            );
        }
        if counts[0] == labels.voxel_count() {
            warn!("region labeling: no voxel matched any region");
        }
        info!("region labeling: processing completed");

        Ok(labels)
    }
}
