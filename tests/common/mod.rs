//! Record builders shared by the integration tests

#![allow(dead_code)]

use dicom_volume_assembly::{SliceGeometry, SliceRecord};
use nalgebra::Vector3;

pub const FRAME_OF_REFERENCE: &str = "1.3.12.2.1107.5.2.32.35162";
pub const SLICE_SPACING: f64 = 2.5;

/// Axial slice at `position * SLICE_SPACING` along z.
pub fn axial(payload: usize, acquisition_index: i32, position: usize) -> SliceRecord<usize> {
    oriented(
        payload,
        acquisition_index,
        Vector3::new(0.0, 0.0, position as f64 * SLICE_SPACING),
        Vector3::x(),
        Vector3::y(),
    )
}

pub fn oriented(
    payload: usize,
    acquisition_index: i32,
    origin: Vector3<f64>,
    row_direction: Vector3<f64>,
    column_direction: Vector3<f64>,
) -> SliceRecord<usize> {
    SliceRecord::new(payload)
        .with_frame_of_reference(FRAME_OF_REFERENCE)
        .with_series_description("ep2d_perf")
        .with_extent([64, 64, 1, 1])
        .with_acquisition_index(acquisition_index)
        .with_attribute("Modality", "MR")
        .with_geometry(SliceGeometry::new(
            origin,
            row_direction,
            column_direction,
            Vector3::new(1.8, 1.8, 5.0),
        ))
}

/// Slices acquired position by position, `repeats[p]` samples at position
/// `p`. Payloads and acquisition indices follow acquisition order.
pub fn time_series(repeats: &[usize]) -> Vec<SliceRecord<usize>> {
    let mut slices = Vec::new();
    for (position, count) in repeats.iter().enumerate() {
        for _ in 0..*count {
            let payload = slices.len();
            slices.push(axial(payload, payload as i32 + 1, position));
        }
    }
    slices
}
