//! 8-bit grey renderings of histogram images and label slices.

use crate::enums::Orientation;
use crate::histogram::HistogramImage;
use crate::volume::LabelVolume;

use image::{GrayImage, ImageBuffer, Luma};

/// Render the log histogram with 0 as black and the largest cell as white.
///
/// Rows are flipped so that B grows upwards, as in a scatter plot.
pub fn histogram_to_image(histogram: &HistogramImage) -> GrayImage {
    let (width, height) = histogram.dim();
    let max = histogram.max();
    ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
        let row = height - 1 - y as usize;
        let value = histogram.data[[row, x as usize]];
        Luma([normalize_to_u8(value, max)])
    })
}

#[inline]
fn normalize_to_u8(value: f32, max: f32) -> u8 {
    if max <= 0.0 {
        return 0;
    }
    ((value / max) * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Render one slice of a label volume. Background stays black and labels
/// are spread evenly over the remaining grey levels.
pub fn label_slice_to_image(
    labels: &LabelVolume,
    index: usize,
    orientation: Orientation,
) -> Option<GrayImage> {
    let slice = labels.get_slice_from_axis(index, orientation)?;
    let max_label = labels.max_label();
    let (height, width) = slice.dim();
    let pixel_data: Vec<u8> = slice.iter().map(|&l| label_to_u8(l, max_label)).collect();
    ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
}

#[inline]
fn label_to_u8(label: u32, max_label: u32) -> u8 {
    if label == 0 || max_label == 0 {
        return 0;
    }
    (55.0 + 200.0 * f64::from(label) / f64::from(max_label)).round() as u8
}
