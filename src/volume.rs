use crate::enums::Orientation;
use crate::error::{DectError, Result};

use ndarray::{Array3, ArrayView2, ShapeError, s};

/// A scalar type that can be stored in a [`VolumeSample`].
///
/// Binning and tolerance tests happen in `f64`. Every implementing type
/// widens to `f64` without loss.
pub trait Voxel: Copy + Send + Sync + 'static {
    fn to_f64(self) -> f64;
}

macro_rules! impl_voxel {
    ($($ty:ty),*) => {
        $(
            impl Voxel for $ty {
                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_voxel!(u8, i8, u16, i16, u32, i32, f32, f64);

/// Placement of a voxel grid in patient space.
///
/// `spacing` and `origin` are given in (x, y, z) order. `direction[i]` is the
/// unit vector of grid axis i (x, y, z).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub spacing: (f64, f64, f64),
    pub origin: (f64, f64, f64),
    pub direction: [[f64; 3]; 3],
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            spacing: (1.0, 1.0, 1.0),
            origin: (0.0, 0.0, 0.0),
            direction: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }
}

impl Geometry {
    pub fn new(spacing: (f64, f64, f64), origin: (f64, f64, f64)) -> Self {
        Self {
            spacing,
            origin,
            ..Default::default()
        }
    }
}

/// An owned voxel grid in (depth, height, width) order with its geometry.
#[derive(Clone, Debug, Default)]
pub struct VolumeSample<T> {
    pub data: Array3<T>,
    pub geometry: Geometry,
}

/// Region indices per voxel, 0 meaning background.
pub type LabelVolume = VolumeSample<u32>;

impl<T: Voxel> VolumeSample<T> {
    pub fn new(data: Array3<T>, geometry: Geometry) -> Self {
        Self { data, geometry }
    }

    /// Build a volume from samples laid out in (depth, height, width) order.
    pub fn from_shape_vec(
        shape: (usize, usize, usize),
        values: Vec<T>,
        geometry: Geometry,
    ) -> std::result::Result<Self, ShapeError> {
        Ok(Self::new(Array3::from_shape_vec(shape, values)?, geometry))
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn voxel_count(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn ensure_same_shape<U: Voxel>(&self, other: &VolumeSample<U>) -> Result<()> {
        if self.dim() != other.dim() {
            return Err(DectError::ShapeMismatch {
                a: self.dim(),
                b: other.dim(),
            });
        }
        Ok(())
    }

    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
    ) -> Option<ArrayView2<'_, T>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let slice = match orientation {
            Orientation::Axial => self.data.slice(s![index, .., ..]),
            Orientation::Coronal => self.data.slice(s![.., index, ..]),
            Orientation::Sagittal => self.data.slice(s![.., .., index]),
        };
        Some(slice)
    }

    fn is_valid_index(&self, index: usize, orientation: Orientation) -> bool {
        let dim = self.data.dim();
        let max_index = match orientation {
            Orientation::Axial => dim.0,
            Orientation::Coronal => dim.1,
            Orientation::Sagittal => dim.2,
        };
        index < max_index
    }
}

impl LabelVolume {
    /// Number of voxels carrying each label, indexed by label (0 is background).
    pub fn label_counts(&self, region_count: usize) -> Vec<usize> {
        let mut counts = vec![0usize; region_count + 1];
        for &label in self.data.iter() {
            if let Some(count) = counts.get_mut(label as usize) {
                *count += 1;
            }
        }
        counts
    }

    pub fn max_label(&self) -> u32 {
        self.data.iter().copied().max().unwrap_or(0)
    }
}
