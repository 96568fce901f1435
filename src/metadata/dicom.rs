//! DICOM Part-10 extraction on top of `dicom-object`.
//!
//! Files are opened with reading cut off at Pixel Data, so only the header
//! elements are parsed. Every keyword in [`DEFAULT_KEYWORDS`] (plus any
//! added with [`DicomExtractor::with_keyword`]) that is present and has a
//! textual value ends up in the [`FieldMap`].

use std::error::Error as StdError;
use std::path::{Path, PathBuf};

use dicom_dictionary_std::tags;
use dicom_object::{DefaultDicomObject, OpenFileOptions, ReadError};

use super::{FieldMap, MetadataError, MetadataExtractor};

/// Keywords collected from every file.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "SOPClassUID",
    "SOPInstanceUID",
    "StudyDate",
    "Modality",
    "Manufacturer",
    "InstitutionName",
    "StudyDescription",
    "SeriesDescription",
    "PatientName",
    "PatientID",
    "BodyPartExamined",
    "StudyInstanceUID",
    "SeriesInstanceUID",
    "StudyID",
];

/// Extractor for DICOM Part-10 files.
#[derive(Debug, Clone)]
pub struct DicomExtractor {
    keywords: Vec<String>,
}

impl Default for DicomExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DicomExtractor {
    pub fn new() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Also collect `keyword`, e.g. a non-default classification field.
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        let keyword = keyword.into();
        if !self.keywords.contains(&keyword) {
            self.keywords.push(keyword);
        }
        self
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    fn collect(&self, obj: &DefaultDicomObject) -> FieldMap {
        let mut fields = FieldMap::new();

        let meta = obj.meta();
        fields.insert("TransferSyntaxUID", clean(meta.transfer_syntax()));
        fields.insert(
            "MediaStorageSOPClassUID",
            clean(meta.media_storage_sop_class_uid()),
        );

        for keyword in &self.keywords {
            // Unknown keywords and absent elements are simply skipped.
            let Ok(element) = obj.element_by_name(keyword) else {
                continue;
            };
            match element.to_str() {
                Ok(value) => fields.insert(keyword.as_str(), clean(&value)),
                Err(e) => {
                    crate::debug_event!("dicom", "skipped", "{keyword}: {e}");
                }
            }
        }
        fields
    }
}

impl MetadataExtractor for DicomExtractor {
    fn extract(&self, path: &Path) -> Result<FieldMap, MetadataError> {
        let obj = OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(path)
            .map_err(|e| map_read_error(path, e))?;
        Ok(self.collect(&obj))
    }
}

/// Strip DICOM value padding.
fn clean(value: &str) -> String {
    value.trim_matches(|c: char| c == '\0' || c.is_whitespace()).to_string()
}

fn map_read_error(path: &Path, err: ReadError) -> MetadataError {
    let path = PathBuf::from(path);
    match err {
        ReadError::OpenFile { source, .. } | ReadError::ReadFile { source, .. } => {
            MetadataError::Io { path, source }
        }
        ReadError::ReadPreambleBytes { .. } | ReadError::ParseMetaDataSet { .. } => {
            MetadataError::NotDicom { path }
        }
        ReadError::ReadUnsupportedTransferSyntax { uid, .. } => {
            MetadataError::UnsupportedTransferSyntax { path, uid: clean(&uid) }
        }
        other => MetadataError::Malformed {
            path,
            reason: error_chain(&other),
        },
    }
}

/// `outer: inner: root` rendering of an error and its sources.
fn error_chain(err: &dyn StdError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::{DataElement, PrimitiveValue, VR};
    use dicom_object::InMemDicomObject;
    use dicom_object::meta::FileMetaTableBuilder;
    use tempfile::TempDir;

    const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";
    const IMPLICIT_VR_LE: &str = "1.2.840.10008.1.2";

    fn write(path: &Path, transfer_syntax: &str, elements: &[(dicom_core::Tag, VR, &str)]) {
        let mut obj = InMemDicomObject::new_empty();
        for (tag, vr, value) in elements {
            obj.put(DataElement::new(*tag, *vr, PrimitiveValue::from(*value)));
        }
        let file_obj = obj
            .with_meta(
                FileMetaTableBuilder::new()
                    .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.1")
                    .media_storage_sop_instance_uid("1.2.826.0.1.3680043.2.1125.1")
                    .transfer_syntax(transfer_syntax),
            )
            .unwrap();
        file_obj.write_to_file(path).unwrap();
    }

    #[test]
    fn test_explicit_little_endian() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("1.dcm");
        write(
            &path,
            EXPLICIT_VR_LE,
            &[
                (tags::MODALITY, VR::CS, "CR"),
                (tags::STUDY_DESCRIPTION, VR::LO, "Chest X-Ray"),
                (tags::PATIENT_ID, VR::LO, "P123"),
            ],
        );

        let fields = DicomExtractor::new().extract(&path).unwrap();
        assert_eq!(fields.get("StudyDescription"), Some("Chest X-Ray"));
        assert_eq!(fields.get("Modality"), Some("CR"));
        assert_eq!(fields.get("PatientID"), Some("P123"));
        assert_eq!(fields.get("TransferSyntaxUID"), Some(EXPLICIT_VR_LE));
        assert_eq!(
            fields.get("MediaStorageSOPClassUID"),
            Some("1.2.840.10008.5.1.4.1.1.1")
        );
    }

    #[test]
    fn test_implicit_little_endian() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("1.dcm");
        write(
            &path,
            IMPLICIT_VR_LE,
            &[(tags::STUDY_DESCRIPTION, VR::LO, "Head CT")],
        );

        let fields = DicomExtractor::new().extract(&path).unwrap();
        assert_eq!(fields.get("StudyDescription"), Some("Head CT"));
        assert_eq!(fields.get("TransferSyntaxUID"), Some(IMPLICIT_VR_LE));
    }

    #[test]
    fn test_odd_length_value_is_unpadded() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("1.dcm");
        write(&path, EXPLICIT_VR_LE, &[(tags::STUDY_DESCRIPTION, VR::LO, "Spine")]);

        let fields = DicomExtractor::new().extract(&path).unwrap();
        assert_eq!(fields.get("StudyDescription"), Some("Spine"));
    }

    #[test]
    fn test_absent_description() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("1.dcm");
        write(&path, EXPLICIT_VR_LE, &[(tags::MODALITY, VR::CS, "US")]);

        let fields = DicomExtractor::new().extract(&path).unwrap();
        assert_eq!(fields.get("StudyDescription"), None);
        assert_eq!(fields.get("Modality"), Some("US"));
    }

    #[test]
    fn test_extra_keyword() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("1.dcm");
        write(
            &path,
            EXPLICIT_VR_LE,
            &[(tags::ACCESSION_NUMBER, VR::SH, "ACC42")],
        );

        let fields = DicomExtractor::new().extract(&path).unwrap();
        assert_eq!(fields.get("AccessionNumber"), None);

        let extractor = DicomExtractor::new()
            .with_keyword("AccessionNumber")
            .with_keyword("AccessionNumber");
        assert_eq!(extractor.keywords().len(), DEFAULT_KEYWORDS.len() + 1);
        let fields = extractor.extract(&path).unwrap();
        assert_eq!(fields.get("AccessionNumber"), Some("ACC42"));
    }

    #[test]
    fn test_not_dicom() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fake.dcm");
        let mut bytes = vec![0u8; 128];
        bytes.extend_from_slice(b"NOPE");
        bytes.extend_from_slice(&[0u8; 64]);
        std::fs::write(&path, bytes).unwrap();

        let err = DicomExtractor::new().extract(&path).unwrap_err();
        assert!(matches!(err, MetadataError::NotDicom { .. }), "got {err}");
    }

    #[test]
    fn test_unsupported_transfer_syntax() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("1.dcm");
        write(&path, EXPLICIT_VR_LE, &[(tags::STUDY_DESCRIPTION, VR::LO, "Chest")]);

        // Same-length swap keeps the meta group length valid.
        let mut bytes = std::fs::read(&path).unwrap();
        let needle = b"10008.1.2.1";
        let at = bytes
            .windows(needle.len())
            .position(|w| w == needle)
            .unwrap();
        bytes[at..at + needle.len()].copy_from_slice(b"99999.9.9.9");
        std::fs::write(&path, bytes).unwrap();

        let err = DicomExtractor::new().extract(&path).unwrap_err();
        match err {
            MetadataError::UnsupportedTransferSyntax { uid, .. } => {
                assert!(uid.contains("99999.9.9.9"), "uid {uid}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.dcm");
        let err = DicomExtractor::new().extract(&missing).unwrap_err();
        assert!(matches!(err, MetadataError::Io { .. }), "got {err}");
    }

    #[test]
    fn test_clean_strips_padding() {
        assert_eq!(clean("1.2.3\0"), "1.2.3");
        assert_eq!(clean("CHEST "), "CHEST");
        assert_eq!(clean(""), "");
    }
}
