//! # DECT explorer library
//!
//! Tools for exploring dual-energy CT acquisitions: two co-registered
//! volumes of the same anatomy scanned at different tube energies.
//!
//! The crate does two things:
//!  - builds a joint histogram of the two volumes, a 2D scatter plot of
//!    (A, B) value pairs whose dense clusters correspond to tissue types
//!  - labels every voxel by which picked (A, B) anchor's tolerance box its
//!    value pair falls into, so the clusters can be located in the anatomy
//!
//! Counts are log-compressed (`ln(1 + count)`) before display and the
//! histogram image carries a geometry that maps pixels back to values, so
//! anchors can be read straight off it. Where tolerance boxes overlap, the
//! later anchor in the list wins.
//!
//! Volumes are plain owned [`ndarray`] buffers with spacing, origin and
//! direction metadata. A DICOM series can be read with [`VolumeLoader`], and
//! both loops can run on the rayon thread pool.
//!
//! # Examples
//!
//! ## Building a histogram and labeling a picked cluster
//!
//! ```no_run
//! # use dect_explorer::{HistogramBuilder, RegionLabeler, RegionTable, SortBy, VolumeLoader};
//! let low = VolumeLoader::load_from_directory("dicom/80kv", SortBy::ImagePositionPatient)
//!     .expect("should have loaded the low energy series");
//! let high = VolumeLoader::load_from_directory("dicom/140kv", SortBy::ImagePositionPatient)
//!     .expect("should have loaded the high energy series");
//!
//! let (_, histogram) = HistogramBuilder::new(200)
//!     .build(&low, &high)
//!     .expect("series should have the same shape");
//!
//! let mut regions = RegionTable::new();
//! regions.push_pixel(&histogram, 120, 80);
//! let labels = RegionLabeler::default()
//!     .label(&low, &high, regions.as_slice(), 10.0)
//!     .expect("should have labeled the volume");
//! println!("{} voxels matched", labels.label_counts(1)[1]);
//! ```

pub mod enums;
pub mod error;
pub mod export;
pub mod histogram;
pub mod labeler;
pub mod regions;
pub mod settings;
pub mod volume;
pub mod volume_loader;

pub use enums::{Orientation, Processor, SortBy};
pub use error::{DectError, Input, Result};
pub use histogram::{HistogramBuilder, HistogramImage, JointHistogram};
pub use labeler::{ParseRegionError, Region, RegionLabeler};
pub use regions::RegionTable;
pub use settings::{ExplorerSettings, MemoryStore, SettingsStore};
pub use volume::{Geometry, LabelVolume, VolumeSample, Voxel};
pub use volume_loader::{VolumeLoader, VolumeLoaderError};
