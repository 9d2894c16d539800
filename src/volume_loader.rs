use crate::{
    enums::SortBy,
    volume::{Geometry, VolumeSample},
};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use log::{debug, info};
use ndarray::{Array2, Array3, s};
use std::{fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

/// One decoded slice with the keys used to order and place it.
struct SliceImage {
    order: Option<f32>,
    position: Option<(f64, f64, f64)>,
    pixels: Array2<f32>,
}

/// Reads a DICOM series into a [`VolumeSample<f32>`] holding modality values
/// (Hounsfield units for CT).
pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from DICOM objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects
    /// * `sort_by` - Method to sort the slices
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found or dimensions are inconsistent
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<VolumeSample<f32>, VolumeLoaderError> {
        let mut slices: Vec<_> = dicom_objects
            .iter()
            .filter_map(|dicom_object| Self::extract_slice(dicom_object, &sort_by))
            .collect();

        if slices.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }
        debug!(
            "decoded {} of {} DICOM objects",
            slices.len(),
            dicom_objects.len()
        );

        Self::sort_slices(&mut slices, sort_by);
        Self::validate_dimensions(&slices)?;

        let pixel_spacing =
            Self::get_pixel_spacing(dicom_objects).ok_or(VolumeLoaderError::MissingSpacing)?;
        let direction =
            Self::get_direction(dicom_objects).unwrap_or(Geometry::default().direction);
        let geometry = Self::slice_geometry(
            &slices,
            pixel_spacing,
            Self::get_slice_thickness(dicom_objects),
            direction,
        )
        .ok_or(VolumeLoaderError::MissingSpacing)?;
        let volume = VolumeSample::new(Self::build_volume_array(&slices), geometry);
        info!("loaded volume of shape {:?}", volume.dim());

        Ok(volume)
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        sort_by: SortBy,
    ) -> Result<VolumeSample<f32>, VolumeLoaderError> {
        let objects: Result<Vec<_>, _> =
            paths.iter().map(|path| open_file(path.as_ref())).collect();

        Self::load_from_dicom_objects(&objects?, sort_by)
    }

    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<VolumeSample<f32>, VolumeLoaderError> {
        let paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        Self::load_from_file_paths(&paths, sort_by)
    }

    fn extract_slice(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<SliceImage> {
        let order = Self::get_sort_order(dicom_object, sort_by)?;
        let pixels = Self::decode_image(dicom_object)?;
        Some(SliceImage {
            order,
            position: Self::get_position(dicom_object),
            pixels,
        })
    }

    fn get_sort_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<Option<f32>> {
        match sort_by {
            SortBy::ImagePositionPatient => {
                let pos = dicom_object
                    .element(tags::IMAGE_POSITION_PATIENT)
                    .ok()?
                    .to_multi_float32()
                    .ok()?;
                Some(pos.get(2).copied())
            }
            SortBy::TablePosition => {
                let pos = dicom_object
                    .element(tags::TABLE_POSITION)
                    .ok()?
                    .to_float32()
                    .ok();
                Some(pos)
            }
            SortBy::InstanceNumber => {
                let num = dicom_object
                    .element(tags::INSTANCE_NUMBER)
                    .ok()?
                    .to_int::<i32>()
                    .ok()
                    .map(|n| n as f32);
                Some(num)
            }
            SortBy::None => Some(Some(0.0)),
        }
    }

    fn get_position(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<(f64, f64, f64)> {
        let pos = dicom_object
            .element(tags::IMAGE_POSITION_PATIENT)
            .ok()?
            .to_multi_float64()
            .ok()?;
        match pos.as_slice() {
            [x, y, z, ..] => Some((*x, *y, *z)),
            _ => None,
        }
    }

    // Rescale slope/intercept are applied so samples are in modality units.
    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<f32>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new()
            .with_modality_lut(ModalityLutOption::Default)
            .with_voi_lut(VoiLutOption::Identity);
        pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn sort_slices(slices: &mut [SliceImage], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            slices.sort_by(|a, b| {
                a.order
                    .partial_cmp(&b.order)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        if matches!(sort_by, SortBy::ImagePositionPatient) {
            slices.reverse();
        }
    }

    fn validate_dimensions(slices: &[SliceImage]) -> Result<(), VolumeLoaderError> {
        let first_dim = slices[0].pixels.dim();
        if slices.iter().any(|slice| slice.pixels.dim() != first_dim) {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        Ok(())
    }

    fn build_volume_array(slices: &[SliceImage]) -> Array3<f32> {
        let (height, width) = slices[0].pixels.dim();
        let depth = slices.len();
        let mut volume = Array3::<f32>::zeros((depth, height, width));

        for (i, slice) in slices.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(&slice.pixels);
        }

        volume
    }

    /// Geometry of the sorted stack. Slice `k` sits at
    /// `origin + k * spacing.2 * direction[2]`.
    ///
    /// The slice axis is measured from the first and last ImagePositionPatient
    /// so that descending stacks and gapped or overlapping series are placed
    /// where they were acquired. Without two distinct positions the normal of
    /// the image plane and `thickness` are used instead.
    fn slice_geometry(
        slices: &[SliceImage],
        (spacing_x, spacing_y): (f64, f64),
        thickness: Option<f64>,
        mut direction: [[f64; 3]; 3],
    ) -> Option<Geometry> {
        let first = slices.first()?;
        let spacing_z = match Self::measure_slice_axis(slices) {
            Some((step, axis)) => {
                direction[2] = axis;
                step
            }
            None => thickness?,
        };
        Some(Geometry {
            spacing: (spacing_x, spacing_y, spacing_z),
            origin: first.position.unwrap_or((0.0, 0.0, 0.0)),
            direction,
        })
    }

    /// Mean distance between neighbouring slices and the unit vector from the
    /// first slice towards the last.
    fn measure_slice_axis(slices: &[SliceImage]) -> Option<(f64, [f64; 3])> {
        if slices.len() < 2 {
            return None;
        }
        let (x0, y0, z0) = slices.first()?.position?;
        let (x1, y1, z1) = slices.last()?.position?;
        let delta = [x1 - x0, y1 - y0, z1 - z0];
        let length = delta.iter().map(|c| c * c).sum::<f64>().sqrt();
        if !length.is_finite() || length <= 0.0 {
            return None;
        }
        Some((
            length / (slices.len() - 1) as f64,
            delta.map(|c| c / length),
        ))
    }

    /// In-plane spacing in (x, y) order. PixelSpacing is stored as (row, column).
    fn get_pixel_spacing(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<(f64, f64)> {
        dicom_objects.iter().find_map(|dicom_object| {
            let pixel_spacing = dicom_object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float64()
                .ok()?;

            match pixel_spacing.as_slice() {
                [row, column, ..] => Some((*column, *row)),
                _ => None,
            }
        })
    }

    fn get_slice_thickness(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<f64> {
        dicom_objects.iter().find_map(|dicom_object| {
            dicom_object
                .element(tags::SLICE_THICKNESS)
                .ok()?
                .to_float64()
                .ok()
        })
    }

    /// Row, column and normal unit vectors from ImageOrientationPatient.
    fn get_direction(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<[[f64; 3]; 3]> {
        dicom_objects.iter().find_map(|dicom_object| {
            let cosines = dicom_object
                .element(tags::IMAGE_ORIENTATION_PATIENT)
                .ok()?
                .to_multi_float64()
                .ok()?;
            match cosines.as_slice() {
                [rx, ry, rz, cx, cy, cz, ..] => {
                    let row = [*rx, *ry, *rz];
                    let column = [*cx, *cy, *cz];
                    Some([row, column, cross(row, column)])
                }
                _ => None,
            }
        })
    }
}

fn cross(u: [f64; 3], v: [f64; 3]) -> [f64; 3] {
    [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(order: f32, value: f32) -> SliceImage {
        SliceImage {
            order: Some(order),
            position: Some((0.0, 0.0, f64::from(order))),
            pixels: Array2::from_elem((2, 3), value),
        }
    }

    fn slice_at(z: f64, value: f32) -> SliceImage {
        SliceImage {
            order: Some(z as f32),
            position: Some((-120.0, -80.0, z)),
            pixels: Array2::from_elem((2, 3), value),
        }
    }

    fn z_of(geometry: &Geometry, index: usize) -> f64 {
        geometry.origin.2 + index as f64 * geometry.spacing.2 * geometry.direction[2][2]
    }

    #[test]
    fn descending_stack_keeps_acquired_positions() {
        let mut slices = vec![slice_at(0.0, 100.0), slice_at(1.0, 200.0)];
        VolumeLoader::sort_slices(&mut slices, SortBy::ImagePositionPatient);
        let volume = VolumeLoader::build_volume_array(&slices);
        let geometry = VolumeLoader::slice_geometry(
            &slices,
            (0.5, 0.5),
            Some(3.0),
            Geometry::default().direction,
        )
        .unwrap();

        assert_eq!(volume[[0, 0, 0]], 200.0);
        assert_eq!(z_of(&geometry, 0), 1.0);
        assert_eq!(volume[[1, 0, 0]], 100.0);
        assert_eq!(z_of(&geometry, 1), 0.0);
        assert_eq!(geometry.direction[2], [0.0, 0.0, -1.0]);
        assert_eq!(geometry.origin, (-120.0, -80.0, 1.0));
    }

    #[test]
    fn ascending_stack_runs_along_the_normal() {
        let mut slices = vec![slice_at(20.0, 2.0), slice_at(10.0, 1.0)];
        VolumeLoader::sort_slices(&mut slices, SortBy::InstanceNumber);
        let geometry = VolumeLoader::slice_geometry(
            &slices,
            (0.5, 0.5),
            None,
            Geometry::default().direction,
        )
        .unwrap();

        assert_eq!(geometry.direction[2], [0.0, 0.0, 1.0]);
        assert_eq!(geometry.spacing, (0.5, 0.5, 10.0));
        assert_eq!(z_of(&geometry, 1), 20.0);
    }

    #[test]
    fn slice_spacing_comes_from_positions_not_thickness() {
        // 2.5 mm apart with 1 mm thick slices.
        let slices = vec![slice_at(0.0, 0.0), slice_at(2.5, 0.0), slice_at(5.0, 0.0)];
        let geometry = VolumeLoader::slice_geometry(
            &slices,
            (0.7, 0.6),
            Some(1.0),
            Geometry::default().direction,
        )
        .unwrap();
        assert_eq!(geometry.spacing, (0.7, 0.6, 2.5));
    }

    #[test]
    fn single_slice_falls_back_to_thickness() {
        let slices = vec![slice_at(4.0, 0.0)];
        let direction = Geometry::default().direction;
        let geometry =
            VolumeLoader::slice_geometry(&slices, (1.0, 1.0), Some(3.0), direction).unwrap();
        assert_eq!(geometry.spacing.2, 3.0);
        assert_eq!(geometry.direction, direction);
        assert!(VolumeLoader::slice_geometry(&slices, (1.0, 1.0), None, direction).is_none());
    }

    #[test]
    fn cross_of_axial_axes_is_z() {
        assert_eq!(cross([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn image_position_sorts_descending() {
        let mut slices = vec![slice(1.0, 1.0), slice(3.0, 3.0), slice(2.0, 2.0)];
        VolumeLoader::sort_slices(&mut slices, SortBy::ImagePositionPatient);
        let orders: Vec<_> = slices.iter().map(|s| s.order.unwrap()).collect();
        assert_eq!(orders, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn instance_number_sorts_ascending() {
        let mut slices = vec![slice(2.0, 2.0), slice(1.0, 1.0)];
        VolumeLoader::sort_slices(&mut slices, SortBy::InstanceNumber);
        let volume = VolumeLoader::build_volume_array(&slices);
        assert_eq!(volume.dim(), (2, 2, 3));
        assert_eq!(volume[[0, 1, 2]], 1.0);
        assert_eq!(volume[[1, 0, 0]], 2.0);
    }

    #[test]
    fn mixed_slice_sizes_are_rejected() {
        let mut odd = slice(2.0, 0.0);
        odd.pixels = Array2::zeros((3, 3));
        let slices = vec![slice(1.0, 0.0), odd];
        assert!(matches!(
            VolumeLoader::validate_dimensions(&slices),
            Err(VolumeLoaderError::InconsistentDimensions)
        ));
    }

    #[test]
    fn empty_directory_has_no_images() {
        let dir = std::env::temp_dir().join(format!("dect-explorer-empty-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let result = VolumeLoader::load_from_directory(&dir, SortBy::default());
        assert!(matches!(result, Err(VolumeLoaderError::NoValidImages)));
        fs::remove_dir_all(&dir).unwrap();
    }
}
