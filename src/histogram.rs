//! Joint histogram of two co-registered volumes.
//!
//! The histogram is binned over the observed value range of each input with
//! equal-width bins. The last bin on each axis is closed so that the maximum
//! sample is counted. Counts are kept as-is in [`JointHistogram`] and only
//! log-compressed when turned into a displayable [`HistogramImage`].

use crate::enums::Processor;
use crate::error::{DectError, Input, Result};
use crate::settings::{DEFAULT_BINS, DEFAULT_SLAB_THICKNESS, ExplorerSettings};
use crate::volume::{Geometry, VolumeSample, Voxel};

use log::{debug, info};
use ndarray::{Array2, Axis};
use rayon::prelude::*;

/// Voxels handed to a single rayon task when accumulating in parallel.
const CHUNK_LEN: usize = 1 << 16;

/// Equal-width binning of one histogram axis.
#[derive(Clone, Debug)]
struct AxisBinning {
    edges: Vec<f64>,
    low: f64,
    step: f64,
    bins: usize,
}

impl AxisBinning {
    fn new((min, max): (f64, f64), bins: usize) -> Self {
        // A constant input would give zero-width bins.
        let (low, high) = if min == max {
            (min - 0.5, max + 0.5)
        } else {
            (min, max)
        };
        let step = (high - low) / bins as f64;
        let edges = (0..=bins)
            .map(|i| if i == bins { high } else { low + step * i as f64 })
            .collect();
        Self {
            edges,
            low,
            step,
            bins,
        }
    }

    #[inline]
    fn index(&self, value: f64) -> usize {
        let last = self.bins - 1;
        let guess = ((value - self.low) / self.step).floor();
        let mut index = if guess > 0.0 {
            (guess as usize).min(last)
        } else {
            0
        };
        // Correct for rounding so the index agrees with the stored edges.
        if index > 0 && value < self.edges[index] {
            index -= 1;
        } else if index < last && value >= self.edges[index + 1] {
            index += 1;
        }
        index
    }
}

/// Raw joint counts, indexed `[a_bin, b_bin]`.
#[derive(Clone, Debug, PartialEq)]
pub struct JointHistogram {
    counts: Array2<u64>,
    edges_a: Vec<f64>,
    edges_b: Vec<f64>,
}

impl JointHistogram {
    pub fn counts(&self) -> &Array2<u64> {
        &self.counts
    }

    /// Bin boundaries along A, `bins_a() + 1` values.
    pub fn edges_a(&self) -> &[f64] {
        &self.edges_a
    }

    /// Bin boundaries along B, `bins_b() + 1` values.
    pub fn edges_b(&self) -> &[f64] {
        &self.edges_b
    }

    pub fn bins_a(&self) -> usize {
        self.counts.len_of(Axis(0))
    }

    pub fn bins_b(&self) -> usize {
        self.counts.len_of(Axis(1))
    }

    /// Sum of all counts; equals the voxel count of the inputs.
    pub fn total(&self) -> u64 {
        self.counts.sum()
    }

    /// Apply `ln(1 + count)` and transpose into image layout, rows along B
    /// and columns along A.
    ///
    /// The geometry maps pixel `(col, row)` to `(edges_a[col], edges_b[row])`.
    /// `slab_thickness` only fills the z spacing of the flat image.
    pub fn log_compressed(&self, slab_thickness: f64) -> HistogramImage {
        let counts = &self.counts;
        let data = Array2::from_shape_fn((self.bins_b(), self.bins_a()), |(row, col)| {
            (counts[[col, row]] as f64).ln_1p() as f32
        });
        let geometry = Geometry::new(
            (
                bin_spacing(&self.edges_a),
                bin_spacing(&self.edges_b),
                slab_thickness,
            ),
            (self.edges_a[0], self.edges_b[0], 0.0),
        );
        HistogramImage { data, geometry }
    }
}

fn bin_spacing(edges: &[f64]) -> f64 {
    let width = edges[1] - edges[0];
    if width.is_finite() && width > 0.0 {
        width
    } else {
        1.0
    }
}

/// Log-compressed histogram laid out as a 2D image with value-space geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramImage {
    /// Indexed `[row, col]`, i.e. `[b_bin, a_bin]`.
    pub data: Array2<f32>,
    pub geometry: Geometry,
}

impl HistogramImage {
    /// (width, height) in pixels.
    pub fn dim(&self) -> (usize, usize) {
        let (rows, cols) = self.data.dim();
        (cols, rows)
    }

    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(0.0, f32::max)
    }

    /// Lower-left (A, B) value of the pixel at `(col, row)`.
    pub fn value_at(&self, col: usize, row: usize) -> (f64, f64) {
        let Geometry {
            spacing, origin, ..
        } = self.geometry;
        (
            origin.0 + col as f64 * spacing.0,
            origin.1 + row as f64 * spacing.1,
        )
    }

    /// Pixel `(col, row)` whose bin holds the value pair, or `None` when the
    /// pair lies outside the histogram.
    pub fn pixel_of(&self, value_a: f64, value_b: f64) -> Option<(usize, usize)> {
        let (width, height) = self.dim();
        let col = pixel_index(value_a, self.geometry.origin.0, self.geometry.spacing.0, width)?;
        let row = pixel_index(value_b, self.geometry.origin.1, self.geometry.spacing.1, height)?;
        Some((col, row))
    }

    /// The image as a single-slice volume, depth 1, for hosts that only take
    /// volumetric data.
    pub fn to_volume(&self) -> VolumeSample<f32> {
        VolumeSample::new(self.data.clone().insert_axis(Axis(0)), self.geometry)
    }
}

fn pixel_index(value: f64, origin: f64, spacing: f64, len: usize) -> Option<usize> {
    let position = (value - origin) / spacing;
    if !position.is_finite() || position < 0.0 || position > len as f64 {
        return None;
    }
    Some((position.floor() as usize).min(len.saturating_sub(1)))
}

/// Builds joint histograms with a fixed bin count on both axes.
#[derive(Clone, Copy, Debug)]
pub struct HistogramBuilder {
    bins: usize,
    slab_thickness: f64,
    processor: Processor,
}

impl Default for HistogramBuilder {
    fn default() -> Self {
        Self {
            bins: DEFAULT_BINS,
            slab_thickness: DEFAULT_SLAB_THICKNESS,
            processor: Processor::default(),
        }
    }
}

impl HistogramBuilder {
    pub fn new(bins: usize) -> Self {
        Self {
            bins,
            ..Default::default()
        }
    }

    pub fn from_settings(settings: &ExplorerSettings) -> Self {
        Self {
            bins: settings.bins,
            slab_thickness: settings.slab_thickness,
            processor: settings.processor,
        }
    }

    pub fn with_processor(mut self, processor: Processor) -> Self {
        self.processor = processor;
        self
    }

    pub fn with_slab_thickness(mut self, slab_thickness: f64) -> Self {
        self.slab_thickness = slab_thickness;
        self
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Histogram `a` against `b` and log-compress the result.
    ///
    /// # Errors
    ///
    /// Fails before counting if the shapes differ, `bins` is zero, or a
    /// sample is NaN or infinite.
    pub fn build<A: Voxel, B: Voxel>(
        &self,
        a: &VolumeSample<A>,
        b: &VolumeSample<B>,
    ) -> Result<(JointHistogram, HistogramImage)> {
        let histogram = self.accumulate(a, b)?;
        let image = histogram.log_compressed(self.slab_thickness);
        Ok((histogram, image))
    }

    /// Count voxel pairs without log compression.
    pub fn accumulate<A: Voxel, B: Voxel>(
        &self,
        a: &VolumeSample<A>,
        b: &VolumeSample<B>,
    ) -> Result<JointHistogram> {
        if self.bins == 0 {
            return Err(DectError::InvalidBinCount);
        }
        a.ensure_same_shape(b)?;

        // Both inputs are flattened in logical (z, y, x) order so voxel i of A
        // pairs with voxel i of B regardless of memory layout.
        let a_data = a.data.as_standard_layout();
        let b_data = b.data.as_standard_layout();
        let a_values = a_data.as_slice().unwrap_or_default();
        let b_values = b_data.as_slice().unwrap_or_default();

        let axis_a = AxisBinning::new(value_range(a_values, Input::A)?, self.bins);
        let axis_b = AxisBinning::new(value_range(b_values, Input::B)?, self.bins);

        info!(
            "joint histogram: processing started ({} voxels, {} bins, {})",
            a_values.len(),
            self.bins,
            self.processor.as_str()
        );
        debug!(
            "joint histogram: A spans [{}, {}], B spans [{}, {}]",
            axis_a.edges[0], axis_a.edges[self.bins], axis_b.edges[0], axis_b.edges[self.bins]
        );

        let empty = || Array2::zeros((self.bins, self.bins));
        let counts = match self.processor {
            Processor::Serial => {
                let mut counts = empty();
                count_pairs_into(&mut counts, a_values, b_values, &axis_a, &axis_b);
                counts
            }
            // One partial grid per rayon split rather than per chunk.
            Processor::Parallel => a_values
                .par_chunks(CHUNK_LEN)
                .zip(b_values.par_chunks(CHUNK_LEN))
                .fold(empty, |mut partial, (a_chunk, b_chunk)| {
                    count_pairs_into(&mut partial, a_chunk, b_chunk, &axis_a, &axis_b);
                    partial
                })
                .reduce_with(|mut acc, partial| {
                    acc += &partial;
                    acc
                })
                .unwrap_or_else(empty),
        };

        info!("joint histogram: processing completed");

        Ok(JointHistogram {
            counts,
            edges_a: axis_a.edges,
            edges_b: axis_b.edges,
        })
    }
}

fn value_range<T: Voxel>(values: &[T], volume: Input) -> Result<(f64, f64)> {
    if values.is_empty() {
        return Ok((0.0, 1.0));
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for (index, &value) in values.iter().enumerate() {
        let value = value.to_f64();
        if !value.is_finite() {
            return Err(DectError::NonFiniteSample { volume, index });
        }
        min = min.min(value);
        max = max.max(value);
    }
    Ok((min, max))
}

fn count_pairs_into<A: Voxel, B: Voxel>(
    counts: &mut Array2<u64>,
    a: &[A],
    b: &[B],
    axis_a: &AxisBinning,
    axis_b: &AxisBinning,
) {
    for (&x, &y) in a.iter().zip(b) {
        counts[[axis_a.index(x.to_f64()), axis_b.index(y.to_f64())]] += 1;
    }
}
