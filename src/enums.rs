use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

/// Where the voxel loops run.
///
/// Both processors produce bitwise-identical results; `Parallel` only
/// partitions the voxels across the rayon thread pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Processor {
    Serial,
    #[default]
    Parallel,
}

impl Processor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Processor::Serial => "serial",
            Processor::Parallel => "parallel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "serial" => Some(Processor::Serial),
            "parallel" => Some(Processor::Parallel),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}
