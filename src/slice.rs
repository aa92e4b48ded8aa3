use std::collections::BTreeMap;

use nalgebra::Vector3;

/// A descriptive attribute copied verbatim into volume metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

/// Spatial placement of a single image plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceGeometry {
    /// Position of the first transmitted pixel
    pub origin: Vector3<f64>,
    pub row_direction: Vector3<f64>,
    pub column_direction: Vector3<f64>,
    /// In-plane spacing in x and y; z carries the nominal slice thickness
    pub pixel_spacing: Vector3<f64>,
}

impl SliceGeometry {
    pub fn new(
        origin: Vector3<f64>,
        row_direction: Vector3<f64>,
        column_direction: Vector3<f64>,
        pixel_spacing: Vector3<f64>,
    ) -> Self {
        Self {
            origin,
            row_direction,
            column_direction,
            pixel_spacing,
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            &self.origin,
            &self.row_direction,
            &self.column_direction,
            &self.pixel_spacing,
        ]
        .iter()
        .all(|v| v.iter().all(|c| c.is_finite()))
    }
}

/// Normalized description of one input slice.
///
/// The core never looks inside `payload`; it only reorders references to
/// the records that own it.
#[derive(Debug, Clone)]
pub struct SliceRecord<P> {
    pub frame_of_reference: String,
    pub series_description: String,
    /// Raw dimensionality as reported by the source; only 2, 3 and 4 are
    /// accepted by the aggregator.
    pub dimensionality: u8,
    /// Columns, rows, slices and time steps
    pub extent: [u32; 4],
    pub geometry: Option<SliceGeometry>,
    /// Acquisition (instance) number, 0 when absent
    pub acquisition_index: i32,
    pub time_position: Option<f64>,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub payload: P,
}

impl<P> SliceRecord<P> {
    /// Creates a 2D record without geometry; use the `with_*` methods to
    /// fill in the rest.
    pub fn new(payload: P) -> Self {
        Self {
            frame_of_reference: String::new(),
            series_description: String::new(),
            dimensionality: 2,
            extent: [1, 1, 1, 1],
            geometry: None,
            acquisition_index: 0,
            time_position: None,
            attributes: BTreeMap::new(),
            payload,
        }
    }

    pub fn with_geometry(mut self, geometry: SliceGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_frame_of_reference(mut self, uid: impl Into<String>) -> Self {
        self.frame_of_reference = uid.into();
        self
    }

    pub fn with_series_description(mut self, description: impl Into<String>) -> Self {
        self.series_description = description.into();
        self
    }

    pub fn with_dimensionality(mut self, dimensionality: u8) -> Self {
        self.dimensionality = dimensionality;
        self
    }

    pub fn with_extent(mut self, extent: [u32; 4]) -> Self {
        self.extent = extent;
        self
    }

    pub fn with_acquisition_index(mut self, index: i32) -> Self {
        self.acquisition_index = index;
        self
    }

    pub fn with_time_position(mut self, position: f64) -> Self {
        self.time_position = Some(position);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Origin of the slice, or the coordinate origin for records without
    /// geometry (those never reach a volume group).
    pub fn origin(&self) -> Vector3<f64> {
        self.geometry
            .map(|geometry| geometry.origin)
            .unwrap_or_else(Vector3::zeros)
    }

    /// Plane normal scaled by the in-plane extents, unrounded.
    pub fn normal(&self) -> Option<Vector3<f64>> {
        let geometry = self.geometry.as_ref()?;
        let right = geometry.row_direction * f64::from(self.extent[0]);
        let down = geometry.column_direction * f64::from(self.extent[1]);
        Some(right.cross(&down))
    }

    /// Position of the plane along its own unit normal.
    pub fn slice_location(&self) -> f64 {
        let origin = self.origin();
        match self.normal().and_then(|n| n.try_normalize(f64::EPSILON)) {
            Some(unit) => origin.dot(&unit),
            None => origin.z,
        }
    }

    /// Number of slices minus one, as encoded in the extent of a
    /// multi-slice record.
    pub(crate) fn extent_slice_count(&self) -> usize {
        (self.extent[2] as usize).saturating_sub(1)
    }

    pub(crate) fn extent_time_count(&self) -> usize {
        (self.extent[3] as usize).saturating_sub(1)
    }
}
