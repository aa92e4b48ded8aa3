use crate::slice::{SliceGeometry, SliceRecord};

use dicom::{
    core::Tag,
    object::{FileDicomObject, InMemDicomObject, open_file},
};
use dicom_dictionary_std::tags;
use nalgebra::Vector3;
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Missing required attribute {0}")]
    MissingAttribute(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

/// Tags copied verbatim into each record's attribute map.
const DESCRIPTIVE_TAGS: [(Tag, &str); 8] = [
    (tags::MODALITY, "Modality"),
    (tags::PATIENT_ID, "PatientID"),
    (tags::PATIENT_NAME, "PatientName"),
    (tags::STUDY_INSTANCE_UID, "StudyInstanceUID"),
    (tags::SERIES_INSTANCE_UID, "SeriesInstanceUID"),
    (tags::SERIES_NUMBER, "SeriesNumber"),
    (tags::ACQUISITION_NUMBER, "AcquisitionNumber"),
    (tags::SOP_INSTANCE_UID, "SOPInstanceUID"),
];

pub struct VolumeLoader;

impl VolumeLoader {
    /// Extract a slice record from a DICOM object
    ///
    /// # Arguments
    ///
    /// * `dicom_object` - Parsed DICOM file
    /// * `payload` - Handle forwarded unchanged into the record
    ///
    /// # Errors
    ///
    /// Returns error if the image extent (Rows, Columns) is missing. Missing
    /// position or orientation produces a record without geometry, which the
    /// aggregator reports instead.
    pub fn slice_record_from_dicom<P>(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        payload: P,
    ) -> Result<SliceRecord<P>, VolumeLoaderError> {
        let rows = get_u32(dicom_object, tags::ROWS).ok_or(VolumeLoaderError::MissingAttribute("Rows"))?;
        let columns =
            get_u32(dicom_object, tags::COLUMNS).ok_or(VolumeLoaderError::MissingAttribute("Columns"))?;
        let frames = get_u32(dicom_object, tags::NUMBER_OF_FRAMES).unwrap_or(1).max(1);
        let dimensionality = if frames > 1 { 3 } else { 2 };

        let mut record = SliceRecord::new(payload)
            .with_frame_of_reference(get_string(dicom_object, tags::FRAME_OF_REFERENCE_UID).unwrap_or_default())
            .with_series_description(get_string(dicom_object, tags::SERIES_DESCRIPTION).unwrap_or_default())
            .with_dimensionality(dimensionality)
            .with_extent([columns, rows, frames, 1])
            .with_acquisition_index(get_i32(dicom_object, tags::INSTANCE_NUMBER).unwrap_or(0));
        record.geometry = Self::extract_geometry(dicom_object);
        record.time_position = get_f64(dicom_object, tags::TRIGGER_TIME);

        for (tag, name) in DESCRIPTIVE_TAGS {
            if let Some(value) = get_string(dicom_object, tag) {
                record.attributes.insert(name.to_owned(), value.into());
            }
        }

        Ok(record)
    }

    /// Load slice records from file paths, reading headers in parallel
    ///
    /// Files that cannot be read or lack the image extent are skipped with
    /// a warning.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeLoaderError::NoValidImages`] if no file yields a record.
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path> + Sync],
    ) -> Result<Vec<SliceRecord<PathBuf>>, VolumeLoaderError> {
        let records: Vec<_> = paths
            .par_iter()
            .filter_map(|path| {
                let path = path.as_ref();
                match Self::slice_record_from_file(path) {
                    Ok(record) => Some(record),
                    Err(error) => {
                        warn!(path = %path.display(), %error, "skipping unreadable DICOM file");
                        None
                    }
                }
            })
            .collect();

        if records.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }
        Ok(records)
    }

    fn slice_record_from_file(path: &Path) -> Result<SliceRecord<PathBuf>, VolumeLoaderError> {
        let dicom_object = open_file(path)?;
        Self::slice_record_from_dicom(&dicom_object, path.to_path_buf())
    }

    /// Load slice records from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
    ) -> Result<Vec<SliceRecord<PathBuf>>, VolumeLoaderError> {
        let mut paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        // Directory order is platform dependent
        paths.sort();
        debug!(files = paths.len(), "reading DICOM headers");

        Self::load_from_file_paths(&paths)
    }

    fn extract_geometry(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<SliceGeometry> {
        let position = get_f64_vec(dicom_object, tags::IMAGE_POSITION_PATIENT)?;
        let orientation = get_f64_vec(dicom_object, tags::IMAGE_ORIENTATION_PATIENT)?;
        let ([x, y, z], [rx, ry, rz, cx, cy, cz]) = (position.as_slice(), orientation.as_slice()) else {
            return None;
        };

        let thickness = get_f64(dicom_object, tags::SLICE_THICKNESS).unwrap_or(0.0);
        // PixelSpacing holds the row spacing (y) first, then the column spacing (x)
        let pixel_spacing = match get_f64_vec(dicom_object, tags::PIXEL_SPACING).as_deref() {
            Some([row, column, ..]) => Vector3::new(*column, *row, thickness),
            _ => Vector3::new(0.0, 0.0, thickness),
        };

        Some(SliceGeometry::new(
            Vector3::new(*x, *y, *z),
            Vector3::new(*rx, *ry, *rz),
            Vector3::new(*cx, *cy, *cz),
            pixel_spacing,
        ))
    }
}

fn get_string(dicom_object: &FileDicomObject<InMemDicomObject>, tag: Tag) -> Option<String> {
    let value = dicom_object.element(tag).ok()?.to_str().ok()?;
    let value = value.trim_end_matches(['\0', ' ']);
    (!value.is_empty()).then(|| value.to_owned())
}

fn get_u32(dicom_object: &FileDicomObject<InMemDicomObject>, tag: Tag) -> Option<u32> {
    dicom_object.element(tag).ok()?.to_int::<u32>().ok()
}

fn get_i32(dicom_object: &FileDicomObject<InMemDicomObject>, tag: Tag) -> Option<i32> {
    dicom_object.element(tag).ok()?.to_int::<i32>().ok()
}

fn get_f64(dicom_object: &FileDicomObject<InMemDicomObject>, tag: Tag) -> Option<f64> {
    dicom_object.element(tag).ok()?.to_float64().ok()
}

fn get_f64_vec(dicom_object: &FileDicomObject<InMemDicomObject>, tag: Tag) -> Option<Vec<f64>> {
    dicom_object.element(tag).ok()?.to_multi_float64().ok()
}
