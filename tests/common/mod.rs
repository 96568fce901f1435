//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::path::Path;

use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;
use dicom_object::meta::FileMetaTableBuilder;

/// Part-10 file (explicit VR little endian) carrying `study_description`.
pub fn write_dicom(path: &Path, study_description: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    let mut obj = InMemDicomObject::new_empty();
    obj.put(DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("CR")));
    obj.put(DataElement::new(
        tags::STUDY_DESCRIPTION,
        VR::LO,
        PrimitiveValue::from(study_description),
    ));
    obj.put(DataElement::new(tags::PATIENT_ID, VR::LO, PrimitiveValue::from("P0001")));
    obj.with_meta(
        FileMetaTableBuilder::new()
            .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.1")
            .media_storage_sop_instance_uid("1.2.826.0.1.3680043.2.1125.7")
            .transfer_syntax("1.2.840.10008.1.2.1"),
    )
    .unwrap()
    .write_to_file(path)
    .unwrap();
}

/// Routing rules file content for `(watch_dir, description, endpoint)`.
pub fn rules_json(rules: &[(&Path, &str, &str)]) -> String {
    let entries: Vec<serde_json::Value> = rules
        .iter()
        .map(|(dir, desc, endpoint)| {
            serde_json::json!({
                "watch_dir": dir.to_string_lossy(),
                "study_description": desc,
                "api_endpoint": endpoint,
            })
        })
        .collect();
    serde_json::to_string_pretty(&entries).unwrap()
}
