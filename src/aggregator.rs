use tracing::{debug, info, warn};

use crate::{
    config::AggregationConfig,
    enums::{Dimensionality, SortBy},
    error::Rejection,
    group::VolumeGroup,
    grouping::group_slices,
    slice::SliceRecord,
    spacing::resolve_spacing,
    time_axis::resolve_time_axis,
    volume::{VolumeDescriptor, materialize},
};

/// Result of one aggregation run.
#[derive(Debug)]
pub struct Aggregation<'a, P> {
    pub volumes: Vec<VolumeDescriptor<'a, P>>,
    pub rejections: Vec<Rejection<'a, P>>,
}

#[derive(Debug, Default, Clone)]
pub struct VolumeAggregator {
    config: AggregationConfig,
}

impl VolumeAggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Reconstruct volumes from an unordered collection of slices
    ///
    /// # Arguments
    ///
    /// * `slices` - Records to aggregate; the returned descriptors and
    ///   rejections borrow from them
    ///
    /// Never fails as a whole: every slice ends up in exactly one volume or
    /// exactly one rejection.
    pub fn aggregate<'a, P>(&self, slices: &'a [SliceRecord<P>]) -> Aggregation<'a, P> {
        let config = &self.config;

        let (mut groups, mut rejections) = group_slices(slices, config);
        Self::sort_groups(&mut groups, SortBy::AcquisitionIndex);
        resolve_spacing(&mut groups, config);
        resolve_time_axis(&mut groups, config);
        Self::split_degenerate(&mut groups);
        Self::sort_groups(&mut groups, SortBy::SliceLocation);

        let mut volumes = Vec::with_capacity(groups.len());
        for (ordinal, group) in groups.into_iter().enumerate() {
            match materialize(group, ordinal, config) {
                Ok(volume) => volumes.push(volume),
                Err(rejection) => {
                    warn!("{}", rejection.error);
                    rejections.push(rejection);
                }
            }
        }

        info!(
            slices = slices.len(),
            volumes = volumes.len(),
            rejections = rejections.len(),
            "aggregation finished"
        );

        Aggregation {
            volumes,
            rejections,
        }
    }

    fn sort_groups<P>(groups: &mut [VolumeGroup<'_, P>], sort_by: SortBy) {
        for group in groups {
            group.sort(sort_by);
        }
    }

    /// Detaches the first slice of two-position, single-sample groups so a
    /// stray slice does not pose as a minimal volume together with its
    /// neighbour.
    fn split_degenerate<P>(groups: &mut Vec<VolumeGroup<'_, P>>) {
        let mut index = 0;
        while index < groups.len() {
            let group = &mut groups[index];
            let degenerate = group.dimensionality == Dimensionality::Slice2D
                && !group.inconsistent_time
                && group.slice_count == Some(1)
                && group.time_sample_count == Some(0)
                && !group.members.is_empty();

            if degenerate {
                let first = group.members.remove(0);
                group.slice_count = Some(0);
                if let Some(next) = group.members.first() {
                    group.origin = next.origin();
                }

                let mut single = group.sibling(vec![first]);
                single.slice_count = Some(0);
                single.time_sample_count = Some(0);
                debug!(parent = index, group = groups.len(), "single slice split off");
                groups.push(single);
            }
            index += 1;
        }
    }
}

/// Aggregate with the default tolerances.
pub fn aggregate<P>(slices: &[SliceRecord<P>]) -> Aggregation<'_, P> {
    VolumeAggregator::default().aggregate(slices)
}

/// Aggregate with explicit tolerances.
pub fn aggregate_with<'a, P>(
    slices: &'a [SliceRecord<P>],
    config: &AggregationConfig,
) -> Aggregation<'a, P> {
    VolumeAggregator::new(*config).aggregate(slices)
}
