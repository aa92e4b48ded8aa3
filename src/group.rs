use nalgebra::Vector3;

use crate::{
    config::AggregationConfig,
    enums::{Dimensionality, SortBy},
    slice::SliceRecord,
};

/// Working cluster of slices hypothesised to form one volume.
///
/// Counts are zero based: a resolved `slice_count` of 4 means five spatial
/// positions. `None` marks a count no stage has resolved yet.
#[derive(Debug)]
pub(crate) struct VolumeGroup<'a, P> {
    pub frame_of_reference: &'a str,
    pub series_description: &'a str,
    /// Extent-scaled normal, rounded
    pub normal: Vector3<f64>,
    /// Rounded pixel spacing used for matching
    pub pixel_spacing: Vector3<f64>,
    pub dimensionality: Dimensionality,
    pub origin: Vector3<f64>,
    pub members: Vec<&'a SliceRecord<P>>,
    pub slice_count: Option<usize>,
    pub time_sample_count: Option<usize>,
    /// Pixel spacing with the resolved through-plane distance in z
    pub slice_spacing: Vector3<f64>,
    pub inconsistent_time: bool,
}

impl<'a, P> VolumeGroup<'a, P> {
    pub fn seed(
        record: &'a SliceRecord<P>,
        dimensionality: Dimensionality,
        normal: Vector3<f64>,
        pixel_spacing: Vector3<f64>,
    ) -> Self {
        let (slice_count, time_sample_count) = match dimensionality {
            Dimensionality::Slice2D => (None, None),
            Dimensionality::Volume3D => (Some(record.extent_slice_count()), None),
            Dimensionality::Volume4D => (
                Some(record.extent_slice_count()),
                Some(record.extent_time_count()),
            ),
        };

        Self {
            frame_of_reference: &record.frame_of_reference,
            series_description: &record.series_description,
            normal,
            pixel_spacing,
            dimensionality,
            origin: record.origin(),
            members: vec![record],
            slice_count,
            time_sample_count,
            slice_spacing: pixel_spacing,
            inconsistent_time: false,
        }
    }

    /// A new unresolved group with the same matching attributes, holding
    /// `members`.
    pub fn sibling(&self, members: Vec<&'a SliceRecord<P>>) -> Self {
        let origin = members.first().map_or(self.origin, |first| first.origin());
        Self {
            frame_of_reference: self.frame_of_reference,
            series_description: self.series_description,
            normal: self.normal,
            pixel_spacing: self.pixel_spacing,
            dimensionality: self.dimensionality,
            origin,
            members,
            slice_count: None,
            time_sample_count: None,
            slice_spacing: self.slice_spacing,
            inconsistent_time: false,
        }
    }

    pub fn sort(&mut self, sort_by: SortBy) {
        match sort_by {
            SortBy::AcquisitionIndex => self.members.sort_by(|a, b| {
                a.acquisition_index
                    .cmp(&b.acquisition_index)
                    .then_with(|| a.slice_location().total_cmp(&b.slice_location()))
            }),
            SortBy::SliceLocation => self
                .members
                .sort_by(|a, b| a.slice_location().total_cmp(&b.slice_location())),
        }
    }

    /// Lowers the resolved time count to `observed` when they disagree and
    /// marks the group inconsistent.
    pub fn observe_time_samples(&mut self, observed: usize) {
        match self.time_sample_count {
            Some(current) if current == observed => {}
            Some(current) => {
                self.inconsistent_time = true;
                self.time_sample_count = Some(current.min(observed));
            }
            None => self.time_sample_count = Some(observed),
        }
    }

    /// Number of members the resolved counts call for.
    pub fn expected_member_count(&self) -> Option<usize> {
        Some((self.slice_count? + 1) * (self.time_sample_count? + 1))
    }

    /// Rounded pixel spacing of the first member; an all-zero spacing
    /// becomes isotropic 1.0.
    pub fn fallback_spacing(&self, config: &AggregationConfig) -> Vector3<f64> {
        let spacing = self
            .members
            .first()
            .and_then(|first| first.geometry)
            .map_or_else(Vector3::zeros, |geometry| geometry.pixel_spacing);
        if spacing.iter().all(|c| *c == 0.0) {
            Vector3::repeat(1.0)
        } else {
            config.round_vector(&spacing)
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }
}
