use tracing::debug;

use crate::{config::AggregationConfig, enums::Dimensionality, group::VolumeGroup};

/// Resolves slice and time counts of every group.
///
/// Groups split off while walking are appended to `groups` and resolved by
/// the same loop.
pub(crate) fn resolve_spacing<P>(groups: &mut Vec<VolumeGroup<'_, P>>, config: &AggregationConfig) {
    let mut index = 0;
    while index < groups.len() {
        match groups[index].dimensionality {
            Dimensionality::Slice2D => {
                if let Some(tail) = resolve_group(&mut groups[index], config) {
                    debug!(
                        parent = index,
                        group = groups.len(),
                        moved = tail.len(),
                        "spacing changed, remaining slices split off"
                    );
                    groups.push(tail);
                }
            }
            // Every block of a multi-slice series is one time step
            Dimensionality::Volume3D => {
                let group = &mut groups[index];
                group.time_sample_count = Some(group.len().saturating_sub(1));
            }
            Dimensionality::Volume4D => {}
        }
        index += 1;
    }
}

/// Walks one ordered 2D group. Returns the split-off remainder when the
/// through-plane spacing changes part way.
fn resolve_group<'a, P>(
    group: &mut VolumeGroup<'a, P>,
    config: &AggregationConfig,
) -> Option<VolumeGroup<'a, P>> {
    group.slice_spacing = group.fallback_spacing(config);

    let mut committed: Option<f64> = None;
    let mut slice_count = 0;
    let mut repeats = 0;
    let mut tail = None;

    for position in 1..group.members.len() {
        let previous = group.members[position - 1].origin();
        let current = group.members[position].origin();

        if config.same_position(&previous, &current) {
            repeats += 1;
            continue;
        }

        let spacing = config.round((current - previous).norm());
        match committed {
            None => {
                committed = Some(spacing);
                slice_count += 1;
                group.time_sample_count = Some(repeats);
            }
            Some(resolved) if resolved == spacing => {
                slice_count += 1;
                group.observe_time_samples(repeats);
            }
            Some(_) => {
                let moved = group.members.split_off(position);
                tail = Some(group.sibling(moved));
                break;
            }
        }
        repeats = 0;
    }

    group.slice_count = Some(slice_count);
    match committed {
        Some(resolved) => {
            group.slice_spacing.z = resolved;
            group.observe_time_samples(repeats);
        }
        // Single slice or pure time series
        None => group.time_sample_count = Some(repeats),
    }

    tail
}
