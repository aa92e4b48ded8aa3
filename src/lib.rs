//! # DICOM-volume-assembly library
//!
//! This crate reconstructs the volumes hidden in an unordered collection of
//! image slices.
//!
//! Slices usually arrive without any explicit volume key: a single series
//! may mix localizers, several stacks with different slice spacing, or a
//! time series where every position was acquired more than once. The
//! aggregator clusters the slices by frame of reference, pixel spacing,
//! series description, dimensionality and orientation, then orders and
//! splits every cluster until each one describes a consistent volume:
//!  - Spacing resolution splits stacks whose slice spacing changes
//!  - Time resolution moves surplus time samples into their own volumes
//!  - Two-slice stacks are split into two single-slice images
//!
//! Every resulting group is validated before a [`VolumeDescriptor`] is
//! emitted; groups whose slice count does not add up are returned as
//! [`Rejection`]s together with the slices they contain. No slice is
//! silently dropped.
//!
//! The aggregator itself is format agnostic and works on [`SliceRecord`]s.
//! [`VolumeLoader`] builds those records from DICOM files, reading the
//! headers in parallel using rayon.
//!
//! # Examples
//!
//! ## Aggregating a directory of DICOM files
//!
//! ```no_run
//! # use dicom_volume_assembly::{VolumeLoader, aggregate};
//! let records = VolumeLoader::load_from_directory("dicom")
//!     .expect("should have loaded files from directory");
//! let aggregation = aggregate(&records);
//! for volume in &aggregation.volumes {
//!     println!(
//!         "{}: {} slices x {} time samples",
//!         volume.series_description,
//!         volume.number_of_slices(),
//!         volume.number_of_time_samples(),
//!     );
//! }
//! for rejection in &aggregation.rejections {
//!     eprintln!("{}", rejection.error);
//! }
//! ```

pub mod aggregator;
pub mod config;
pub mod enums;
pub mod error;
mod group;
mod grouping;
pub mod slice;
mod spacing;
mod time_axis;
pub mod volume;
pub mod volume_loader;

pub use aggregator::{Aggregation, VolumeAggregator, aggregate, aggregate_with};
pub use config::AggregationConfig;
pub use enums::{Dimensionality, SortBy};
pub use error::{AggregationError, Rejection};
pub use slice::{AttributeValue, SliceGeometry, SliceRecord};
pub use volume::VolumeDescriptor;
pub use volume_loader::{VolumeLoader, VolumeLoaderError};
