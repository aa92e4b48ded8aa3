use nalgebra::Vector3;
use tracing::{debug, warn};

use crate::{
    config::AggregationConfig,
    enums::Dimensionality,
    error::{AggregationError, Rejection},
    group::VolumeGroup,
    slice::SliceRecord,
};

/// Partitions `slices` into candidate groups in creation order.
///
/// Slices that cannot be grouped are returned as rejections instead.
pub(crate) fn group_slices<'a, P>(
    slices: &'a [SliceRecord<P>],
    config: &AggregationConfig,
) -> (Vec<VolumeGroup<'a, P>>, Vec<Rejection<'a, P>>) {
    let mut groups: Vec<VolumeGroup<'a, P>> = Vec::new();
    let mut rejections = Vec::new();

    for (index, record) in slices.iter().enumerate() {
        let geometry = match record.geometry {
            Some(geometry) if geometry.is_finite() => geometry,
            _ => {
                warn!(index, "slice without usable geometry ignored");
                rejections.push(Rejection::new(
                    AggregationError::MissingGeometry { index },
                    vec![record],
                ));
                continue;
            }
        };

        let dimensionality = match Dimensionality::try_from(record.dimensionality) {
            Ok(dimensionality) => dimensionality,
            Err(dimensionality) => {
                warn!(index, dimensionality, "slice with unsupported dimensionality ignored");
                rejections.push(Rejection::new(
                    AggregationError::UnsupportedDimensionality {
                        index,
                        dimensionality,
                    },
                    vec![record],
                ));
                continue;
            }
        };

        let normal = config.round_vector(&record.normal().unwrap_or_else(Vector3::zeros));
        let pixel_spacing = config.round_vector(&geometry.pixel_spacing);

        // Native 4D volumes never share a group
        let matched = match dimensionality {
            Dimensionality::Volume4D => None,
            _ => groups.iter().position(|group| {
                accepts(group, record, dimensionality, &normal, &pixel_spacing, config)
            }),
        };

        match matched {
            Some(position) => groups[position].members.push(record),
            None => {
                debug!(
                    group = groups.len(),
                    series = %record.series_description,
                    rank = dimensionality.rank(),
                    "new candidate group"
                );
                groups.push(VolumeGroup::seed(record, dimensionality, normal, pixel_spacing));
            }
        }
    }

    (groups, rejections)
}

fn accepts<P>(
    group: &VolumeGroup<'_, P>,
    record: &SliceRecord<P>,
    dimensionality: Dimensionality,
    normal: &Vector3<f64>,
    pixel_spacing: &Vector3<f64>,
    config: &AggregationConfig,
) -> bool {
    let attributes_match = group.frame_of_reference == record.frame_of_reference
        && group.pixel_spacing == *pixel_spacing
        && group.series_description == record.series_description
        && group.dimensionality == dimensionality
        && is_parallel(normal, &group.normal, config);

    if !attributes_match {
        return false;
    }

    match dimensionality {
        Dimensionality::Slice2D => true,
        // Multi-slice blocks batch by identical placement and extent
        _ => {
            config.same_position(&group.origin, &record.origin())
                && group.slice_count == Some(record.extent_slice_count())
        }
    }
}

/// Whether `candidate` is collinear with `reference`, up to sign and scale.
///
/// Components that are zero in one vector must be zero in the other. The
/// remaining components must agree in ratio: the sine of the angle between
/// the vectors may not exceed the configured precision. Symmetric in its
/// arguments.
pub(crate) fn is_parallel(
    candidate: &Vector3<f64>,
    reference: &Vector3<f64>,
    config: &AggregationConfig,
) -> bool {
    let same_zeros = candidate
        .iter()
        .zip(reference.iter())
        .all(|(c, r)| (*c == 0.0) == (*r == 0.0));
    if !same_zeros {
        return false;
    }

    let magnitudes = candidate.norm() * reference.norm();
    if magnitudes == 0.0 {
        // Both zero, as the zero patterns agree
        return true;
    }

    candidate.cross(reference).norm() <= config.tolerance() * magnitudes
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::slice::SliceGeometry;

    fn config() -> AggregationConfig {
        AggregationConfig::default()
    }

    fn slice(payload: u32, z: f64) -> SliceRecord<u32> {
        SliceRecord::new(payload)
            .with_frame_of_reference("1.2.3")
            .with_series_description("T1")
            .with_extent([64, 64, 1, 1])
            .with_geometry(SliceGeometry::new(
                Vector3::new(0.0, 0.0, z),
                Vector3::x(),
                Vector3::y(),
                Vector3::new(0.8, 0.8, 3.0),
            ))
    }

    #[test]
    fn parallel_is_scale_invariant_and_symmetric() {
        let x = Vector3::new(1.0, 0.0, 0.0);
        let double_x = Vector3::new(2.0, 0.0, 0.0);
        let diagonal = Vector3::new(1.0, 1.0, 0.0);

        assert!(is_parallel(&x, &double_x, &config()));
        assert!(is_parallel(&double_x, &x, &config()));
        assert!(is_parallel(&x, &-x, &config()));
        assert!(!is_parallel(&x, &diagonal, &config()));
        assert!(!is_parallel(&diagonal, &x, &config()));
    }

    #[test]
    fn parallel_requires_agreeing_ratios() {
        let a = Vector3::new(1.0, 2.0, 3.0);
        assert!(is_parallel(&(a * 3.0), &a, &config()));
        assert!(!is_parallel(&Vector3::new(1.0, 2.0, 4.0), &a, &config()));
    }

    #[test]
    fn near_parallel_oblique_normals_match_in_both_orders() {
        let coarse = Vector3::new(3.0, 3.01, 0.0);
        let diagonal = Vector3::new(1.0, 1.0, 0.0);
        assert!(is_parallel(&coarse, &diagonal, &config()));
        assert!(is_parallel(&diagonal, &coarse, &config()));

        let tilted = Vector3::new(1.0, 1.2, 0.0);
        assert!(!is_parallel(&tilted, &diagonal, &config()));
        assert!(!is_parallel(&diagonal, &tilted, &config()));
    }

    #[test]
    fn zero_normals_only_match_each_other() {
        let zero = Vector3::zeros();
        assert!(is_parallel(&zero, &zero, &config()));
        assert!(!is_parallel(&zero, &Vector3::z(), &config()));
        assert!(!is_parallel(&Vector3::z(), &zero, &config()));
    }

    proptest! {
        #[test]
        fn parallel_test_is_symmetric(
            a in prop::array::uniform3(-5.0f64..5.0),
            b in prop::array::uniform3(-5.0f64..5.0),
        ) {
            let config = config();
            let a = config.round_vector(&Vector3::from(a));
            let b = config.round_vector(&Vector3::from(b));
            prop_assert_eq!(is_parallel(&a, &b, &config), is_parallel(&b, &a, &config));
        }
    }

    #[test]
    fn matching_slices_share_a_group() {
        let slices = vec![slice(0, 0.0), slice(1, 3.0), slice(2, 6.0)];
        let (groups, rejections) = group_slices(&slices, &config());
        assert!(rejections.is_empty());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 3);
        assert_eq!(groups[0].slice_count, None);
    }

    #[test]
    fn differing_attributes_start_new_groups() {
        let slices = vec![
            slice(0, 0.0),
            slice(1, 0.0).with_frame_of_reference("9.9"),
            slice(2, 0.0).with_series_description("T2"),
            slice(3, 0.0).with_dimensionality(3),
            slice(4, 3.0),
        ];
        let (groups, _) = group_slices(&slices, &config());
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn pixel_spacing_is_compared_after_rounding() {
        let mut noisy = slice(1, 3.0);
        if let Some(geometry) = noisy.geometry.as_mut() {
            geometry.pixel_spacing.x = 0.8001;
        }
        let slices = vec![slice(0, 0.0), noisy];
        let (groups, _) = group_slices(&slices, &config());
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn unusable_slices_are_rejected() {
        let slices = vec![
            SliceRecord::new(0u32),
            slice(1, 0.0).with_dimensionality(5),
            slice(2, 0.0),
        ];
        let (groups, rejections) = group_slices(&slices, &config());
        assert_eq!(groups.len(), 1);
        assert_eq!(
            rejections.iter().map(|r| r.error.clone()).collect::<Vec<_>>(),
            vec![
                AggregationError::MissingGeometry { index: 0 },
                AggregationError::UnsupportedDimensionality {
                    index: 1,
                    dimensionality: 5
                },
            ]
        );
    }

    #[test]
    fn native_4d_slices_never_merge() {
        let slices = vec![
            slice(0, 0.0).with_dimensionality(4).with_extent([64, 64, 10, 5]),
            slice(1, 0.0).with_dimensionality(4).with_extent([64, 64, 10, 5]),
        ];
        let (groups, _) = group_slices(&slices, &config());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].slice_count, Some(9));
        assert_eq!(groups[0].time_sample_count, Some(4));
    }

    #[test]
    fn multi_slice_blocks_batch_by_origin_and_extent() {
        let block = |payload, z, slices| {
            slice(payload, z)
                .with_dimensionality(3)
                .with_extent([64, 64, slices, 1])
        };
        let slices = vec![block(0, 0.0, 20), block(1, 0.0, 20), block(2, 5.0, 20), block(3, 0.0, 30)];
        let (groups, _) = group_slices(&slices, &config());
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0].slice_count, Some(19));
    }

    #[test]
    fn multi_slice_placement_allows_origin_noise() {
        let block = |payload, z| {
            slice(payload, z)
                .with_dimensionality(3)
                .with_extent([64, 64, 20, 1])
        };
        let slices = vec![block(0, 12.0), block(1, 12.0 + 1e-9), block(2, 12.001)];
        let (groups, _) = group_slices(&slices, &config());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
    }
}
