use tracing::debug;

use crate::{config::AggregationConfig, enums::Dimensionality, group::VolumeGroup};

/// Moves surplus time samples of inconsistent groups into secondary groups.
///
/// Each group is handled once; the inconsistency flag is cleared afterwards
/// whatever the outcome. Secondary groups are appended and visited by the
/// same loop.
pub(crate) fn resolve_time_axis<P>(groups: &mut Vec<VolumeGroup<'_, P>>, config: &AggregationConfig) {
    let mut index = 0;
    while index < groups.len() {
        let group = &mut groups[index];
        if group.inconsistent_time && group.dimensionality == Dimensionality::Slice2D {
            let secondaries = split_excess(group, config);
            if !secondaries.is_empty() {
                debug!(
                    parent = index,
                    secondaries = secondaries.len(),
                    "surplus time samples split off"
                );
            }
            groups.extend(secondaries);
        }
        groups[index].inconsistent_time = false;
        index += 1;
    }
}

fn split_excess<'a, P>(
    group: &mut VolumeGroup<'a, P>,
    config: &AggregationConfig,
) -> Vec<VolumeGroup<'a, P>> {
    let Some(time_samples) = group.time_sample_count else {
        return Vec::new();
    };
    let allowed = time_samples + 1;

    let members = std::mem::take(&mut group.members);
    let mut kept = Vec::with_capacity(members.len());
    let mut closed = Vec::new();
    let mut open: Option<VolumeGroup<'a, P>> = None;

    for run in members.chunk_by(|a, b| config.same_position(&a.origin(), &b.origin())) {
        if run.len() > allowed {
            kept.extend_from_slice(&run[..allowed]);
            let excess = &run[allowed..];
            let secondary = open.get_or_insert_with(|| group.sibling(Vec::new()));
            if secondary.members.is_empty() {
                secondary.origin = excess[0].origin();
            }
            secondary.members.extend_from_slice(excess);
            secondary.slice_count = Some(secondary.slice_count.map_or(0, |count| count + 1));
            secondary.observe_time_samples(excess.len() - 1);
        } else {
            kept.extend_from_slice(run);
            if run.len() == allowed {
                closed.extend(open.take());
            }
        }
    }
    closed.extend(open);

    group.members = kept;
    closed
}
