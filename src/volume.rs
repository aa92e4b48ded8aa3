use std::collections::BTreeMap;

use nalgebra::Vector3;
use ndarray::{Array2, ArrayView2};
use tracing::debug;

use crate::config::{AggregationConfig, DEFAULT_COLUMN_DIRECTION, DEFAULT_ROW_DIRECTION};
use crate::enums::Dimensionality;
use crate::error::{AggregationError, Rejection};
use crate::group::VolumeGroup;
use crate::slice::{AttributeValue, SliceGeometry, SliceRecord};

pub const SERIES_DESCRIPTION_KEY: &str = "SeriesDescription";
pub const NUMBER_OF_SLICES_KEY: &str = "NumberOfSlices";
pub const NUMBER_OF_TIME_SLICES_KEY: &str = "NumberOfTimeSlices";
pub const FRAME_OF_REFERENCE_KEY: &str = "FrameOfReferenceUID";
pub const TIME_POSITION_KEY: &str = "TimePosition";

const MISSING_SERIES_DESCRIPTION: &str = "no SeriesDescription";

/// A reconstructed volume referencing the slices it was built from.
#[derive(Debug)]
pub struct VolumeDescriptor<'a, P> {
    pub dimensionality: Dimensionality,
    /// Spatial positions minus one
    pub slice_count: usize,
    /// Time samples per position minus one
    pub time_sample_count: usize,
    /// In-plane pixel spacing in x and y, through-plane spacing in z
    pub spacing: Vector3<f64>,
    pub origin: Vector3<f64>,
    pub row_direction: Vector3<f64>,
    pub column_direction: Vector3<f64>,
    pub normal: Vector3<f64>,
    pub frame_of_reference: String,
    pub series_description: String,
    /// Slices indexed by `(spatial, time)`. Multi-slice records occupy one
    /// cell per block along the time axis.
    pub slices: Array2<&'a SliceRecord<P>>,
    pub metadata: BTreeMap<String, AttributeValue>,
}

impl<'a, P> VolumeDescriptor<'a, P> {
    /// Get the shape of the slice grid (spatial, time)
    pub fn dim(&self) -> (usize, usize) {
        self.slices.dim()
    }

    pub fn slices(&self) -> ArrayView2<'_, &'a SliceRecord<P>> {
        self.slices.view()
    }

    pub fn number_of_slices(&self) -> usize {
        self.slice_count + 1
    }

    pub fn number_of_time_samples(&self) -> usize {
        self.time_sample_count + 1
    }

    pub fn slice_at(&self, spatial: usize, time: usize) -> Option<&'a SliceRecord<P>> {
        self.slices.get((spatial, time)).copied()
    }

    /// Payloads in grid order, time varying fastest.
    pub fn payloads(&self) -> impl Iterator<Item = &'a P> + '_ {
        self.slices.iter().map(|slice| &slice.payload)
    }

    pub fn member_count(&self) -> usize {
        self.slices.len()
    }
}

/// Validates a final group and turns it into a descriptor.
pub(crate) fn materialize<'a, P>(
    group: VolumeGroup<'a, P>,
    ordinal: usize,
    config: &AggregationConfig,
) -> Result<VolumeDescriptor<'a, P>, Rejection<'a, P>> {
    let actual = group.len();
    let counts = group.slice_count.zip(group.time_sample_count);

    let (slice_count, time_sample_count) = match counts {
        Some(counts)
            if group.dimensionality != Dimensionality::Slice2D
                || group.expected_member_count() == Some(actual) =>
        {
            counts
        }
        _ => {
            let error = AggregationError::SliceCountMismatch {
                ordinal,
                series_description: group.series_description.to_owned(),
                expected: group.expected_member_count(),
                actual,
            };
            return Err(Rejection::new(error, group.members));
        }
    };

    if group.inconsistent_time {
        let error = AggregationError::UnresolvedTimeAxis {
            ordinal,
            series_description: group.series_description.to_owned(),
            member_count: actual,
        };
        return Err(Rejection::new(error, group.members));
    }

    let Some(first) = group.members.first().copied() else {
        let error = AggregationError::SliceCountMismatch {
            ordinal,
            series_description: group.series_description.to_owned(),
            expected: group.expected_member_count(),
            actual,
        };
        return Err(Rejection::new(error, group.members));
    };
    let geometry = first.geometry.unwrap_or_else(|| {
        SliceGeometry::new(group.origin, Vector3::zeros(), Vector3::zeros(), Vector3::zeros())
    });

    let mut spacing = if geometry.pixel_spacing.iter().all(|c| *c == 0.0) {
        Vector3::repeat(1.0)
    } else {
        geometry.pixel_spacing
    };
    if group.dimensionality == Dimensionality::Slice2D {
        spacing.z = if actual > 2 {
            most_frequent_spacing(&group.members, config).unwrap_or(group.slice_spacing.z)
        } else {
            group.slice_spacing.z
        };
    }

    let row_direction = substitute_degenerate(geometry.row_direction, DEFAULT_ROW_DIRECTION, ordinal);
    let column_direction =
        substitute_degenerate(geometry.column_direction, DEFAULT_COLUMN_DIRECTION, ordinal);

    let shape = match group.dimensionality {
        Dimensionality::Slice2D => (slice_count + 1, time_sample_count + 1),
        Dimensionality::Volume3D | Dimensionality::Volume4D => (1, actual),
    };
    let dimensionality = output_dimensionality(group.dimensionality, slice_count, time_sample_count);

    let mut metadata = first.attributes.clone();
    let series_description = if group.series_description.is_empty() {
        MISSING_SERIES_DESCRIPTION
    } else {
        group.series_description
    };
    metadata.insert(SERIES_DESCRIPTION_KEY.to_owned(), series_description.into());
    metadata.insert(
        NUMBER_OF_SLICES_KEY.to_owned(),
        AttributeValue::Int((slice_count + 1) as i64),
    );
    metadata.insert(
        NUMBER_OF_TIME_SLICES_KEY.to_owned(),
        AttributeValue::Int((time_sample_count + 1) as i64),
    );
    metadata.insert(
        FRAME_OF_REFERENCE_KEY.to_owned(),
        group.frame_of_reference.into(),
    );
    if group.dimensionality == Dimensionality::Volume4D {
        if let Some(position) = first.time_position {
            metadata.insert(TIME_POSITION_KEY.to_owned(), position.into());
        }
    }

    // Validated above: the grid holds exactly the members
    let columns = shape.1;
    let members = group.members;
    let slices = Array2::from_shape_fn(shape, |(spatial, time)| members[spatial * columns + time]);

    Ok(VolumeDescriptor {
        dimensionality,
        slice_count,
        time_sample_count,
        spacing,
        origin: geometry.origin,
        row_direction,
        column_direction,
        normal: row_direction.cross(&column_direction),
        frame_of_reference: group.frame_of_reference.to_owned(),
        series_description: group.series_description.to_owned(),
        slices,
        metadata,
    })
}

/// Most frequent exact distance between consecutive distinct origins.
///
/// Ties go to the distance seen first along the ordered sequence.
fn most_frequent_spacing<P>(members: &[&SliceRecord<P>], config: &AggregationConfig) -> Option<f64> {
    let (first, rest) = members.split_first()?;
    let mut previous = first.origin();
    let mut tally: Vec<(f64, usize)> = Vec::new();

    for member in rest {
        let origin = member.origin();
        if config.same_position(&origin, &previous) {
            continue;
        }
        let distance = (origin - previous).norm();
        match tally.iter_mut().find(|(seen, _)| *seen == distance) {
            Some((_, count)) => *count += 1,
            None => tally.push((distance, 1)),
        }
        previous = origin;
    }

    tally
        .into_iter()
        .fold(None, |best: Option<(f64, usize)>, (distance, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((distance, count)),
        })
        .map(|(distance, _)| distance)
}

fn substitute_degenerate(direction: Vector3<f64>, default: [f64; 3], ordinal: usize) -> Vector3<f64> {
    if direction.iter().all(|c| *c == 0.0) {
        debug!(group = ordinal, ?default, "degenerate direction vector replaced");
        Vector3::from(default)
    } else {
        direction
    }
}

fn output_dimensionality(
    source: Dimensionality,
    slice_count: usize,
    time_sample_count: usize,
) -> Dimensionality {
    match (source, slice_count, time_sample_count) {
        (Dimensionality::Volume4D, _, _) => Dimensionality::Volume4D,
        (_, _, t) if t > 0 => Dimensionality::Volume4D,
        (Dimensionality::Volume3D, _, _) => Dimensionality::Volume3D,
        (_, 0, _) => Dimensionality::Slice2D,
        _ => Dimensionality::Volume3D,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::SliceGeometry;

    fn at(payload: u32, z: f64) -> SliceRecord<u32> {
        SliceRecord::new(payload)
            .with_series_description("Perfusion")
            .with_attribute("Modality", "MR")
            .with_attribute(NUMBER_OF_SLICES_KEY, 99i64)
            .with_geometry(SliceGeometry::new(
                Vector3::new(0.0, 0.0, z),
                Vector3::x(),
                Vector3::y(),
                Vector3::new(0.7, 0.7, 5.0),
            ))
    }

    fn group<'a>(
        records: &'a [SliceRecord<u32>],
        slice_count: usize,
        time_sample_count: usize,
    ) -> VolumeGroup<'a, u32> {
        let mut group = VolumeGroup::seed(
            &records[0],
            Dimensionality::Slice2D,
            Vector3::z(),
            Vector3::new(0.7, 0.7, 5.0),
        );
        group.members = records.iter().collect();
        group.slice_count = Some(slice_count);
        group.time_sample_count = Some(time_sample_count);
        group.slice_spacing.z = 1.0;
        group
    }

    #[test]
    fn lays_out_slices_by_position_and_time() {
        let records: Vec<_> = (0..6).map(|i| at(i, (i / 2) as f64)).collect();
        let volume = materialize(group(&records, 2, 1), 0, &AggregationConfig::default()).unwrap();

        assert_eq!(volume.dim(), (3, 2));
        assert_eq!(volume.dimensionality, Dimensionality::Volume4D);
        assert_eq!(volume.slice_at(1, 0).map(|s| s.payload), Some(2));
        assert_eq!(volume.slice_at(2, 1).map(|s| s.payload), Some(5));
        assert_eq!(volume.payloads().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(volume.spacing, Vector3::new(0.7, 0.7, 1.0));
    }

    #[test]
    fn count_mismatch_is_rejected_with_all_slices() {
        let records: Vec<_> = (0..5).map(|i| at(i, i as f64)).collect();
        let rejection = materialize(group(&records, 2, 1), 3, &AggregationConfig::default()).unwrap_err();

        assert_eq!(
            rejection.error,
            AggregationError::SliceCountMismatch {
                ordinal: 3,
                series_description: "Perfusion".to_owned(),
                expected: Some(6),
                actual: 5,
            }
        );
        assert_eq!(rejection.slices.len(), 5);
    }

    #[test]
    fn unresolved_counts_are_rejected() {
        let records = vec![at(0, 0.0)];
        let mut unresolved = group(&records, 0, 0);
        unresolved.slice_count = None;
        let rejection = materialize(unresolved, 0, &AggregationConfig::default()).unwrap_err();
        assert!(matches!(
            rejection.error,
            AggregationError::SliceCountMismatch { expected: None, actual: 1, .. }
        ));
    }

    #[test]
    fn flagged_group_is_rejected() {
        let records: Vec<_> = (0..2).map(|i| at(i, i as f64)).collect();
        let mut flagged = group(&records, 1, 0);
        flagged.inconsistent_time = true;
        let rejection = materialize(flagged, 1, &AggregationConfig::default()).unwrap_err();
        assert_eq!(
            rejection.error,
            AggregationError::UnresolvedTimeAxis {
                ordinal: 1,
                series_description: "Perfusion".to_owned(),
                member_count: 2,
            }
        );
    }

    #[test]
    fn published_spacing_is_the_unrounded_mode() {
        let positions = [0.0, 1.125, 2.25, 3.375, 5.0];
        let records: Vec<_> = positions
            .iter()
            .enumerate()
            .map(|(i, z)| at(i as u32, *z))
            .collect();
        let config = AggregationConfig::default();
        let members: Vec<_> = records.iter().collect();
        let spacing = most_frequent_spacing(&members, &config).unwrap();
        assert_eq!(spacing, 1.125);
        assert_ne!(spacing, config.round(spacing));
    }

    #[test]
    fn spacing_ties_go_to_first_seen() {
        let records: Vec<_> = [0.0, 2.0, 5.0, 7.0, 10.0]
            .iter()
            .enumerate()
            .map(|(i, z)| at(i as u32, *z))
            .collect();
        let members: Vec<_> = records.iter().collect();
        assert_eq!(most_frequent_spacing(&members, &AggregationConfig::default()), Some(2.0));
    }

    #[test]
    fn metadata_merges_group_keys_over_slice_attributes() {
        let records = vec![at(0, 0.0).with_series_description("")];
        let mut single = group(&records, 0, 0);
        single.series_description = "";
        let volume = materialize(single, 0, &AggregationConfig::default()).unwrap();

        assert_eq!(volume.dimensionality, Dimensionality::Slice2D);
        assert_eq!(volume.metadata.get("Modality"), Some(&AttributeValue::from("MR")));
        assert_eq!(
            volume.metadata.get(NUMBER_OF_SLICES_KEY),
            Some(&AttributeValue::Int(1))
        );
        assert_eq!(
            volume.metadata.get(SERIES_DESCRIPTION_KEY),
            Some(&AttributeValue::from("no SeriesDescription"))
        );
    }

    #[test]
    fn degenerate_directions_are_substituted() {
        let mut record = at(0, 0.0);
        if let Some(geometry) = record.geometry.as_mut() {
            geometry.row_direction = Vector3::zeros();
            geometry.column_direction = Vector3::zeros();
        }
        let records = vec![record];
        let volume = materialize(group(&records, 0, 0), 0, &AggregationConfig::default()).unwrap();
        assert_eq!(volume.row_direction, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(volume.column_direction, Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(volume.normal, Vector3::new(0.0, 1.0, 0.0));
    }
}
