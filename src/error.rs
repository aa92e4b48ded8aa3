use thiserror::Error;

use crate::slice::SliceRecord;

/// Why a slice or a reconstructed group did not make it into a volume.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    #[error("Slice {index} has no usable geometry")]
    MissingGeometry { index: usize },

    #[error("Slice {index} has unsupported dimensionality {dimensionality}")]
    UnsupportedDimensionality { index: usize, dimensionality: u8 },

    #[error(
        "Group {ordinal} ({series_description}): expected {expected:?} slices from the resolved counts, found {actual}"
    )]
    SliceCountMismatch {
        ordinal: usize,
        series_description: String,
        /// `None` when the counts were never resolved
        expected: Option<usize>,
        actual: usize,
    },

    #[error("Group {ordinal} ({series_description}) with {member_count} slices: could not resolve time axis")]
    UnresolvedTimeAxis {
        ordinal: usize,
        series_description: String,
        member_count: usize,
    },
}

/// A diagnostic together with every slice it accounts for.
#[derive(Debug)]
pub struct Rejection<'a, P> {
    pub error: AggregationError,
    pub slices: Vec<&'a SliceRecord<P>>,
}

impl<'a, P> Rejection<'a, P> {
    pub(crate) fn new(error: AggregationError, slices: Vec<&'a SliceRecord<P>>) -> Self {
        Self { error, slices }
    }

    pub fn payloads(&self) -> impl Iterator<Item = &'a P> + '_ {
        self.slices.iter().map(|slice| &slice.payload)
    }
}
