/// Dimensionality of an incoming slice record or of a reconstructed volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimensionality {
    /// A single 2D image plane.
    Slice2D,
    /// A multi-slice block (multi-frame object).
    Volume3D,
    /// A native time series of volumes.
    Volume4D,
}

impl Dimensionality {
    pub fn rank(self) -> u8 {
        match self {
            Dimensionality::Slice2D => 2,
            Dimensionality::Volume3D => 3,
            Dimensionality::Volume4D => 4,
        }
    }
}

impl TryFrom<u8> for Dimensionality {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Dimensionality::Slice2D),
            3 => Ok(Dimensionality::Volume3D),
            4 => Ok(Dimensionality::Volume4D),
            other => Err(other),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    /// Acquisition index, ties broken by slice location
    #[default]
    AcquisitionIndex,
    SliceLocation,
}
