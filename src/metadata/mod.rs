//! Metadata extraction from image files.
//!
//! The pipeline only needs a keyword -> value map per file. The
//! [`MetadataExtractor`] trait is the seam; [`DicomExtractor`] is the
//! built-in implementation for DICOM Part-10 files.

mod dicom;
mod error;

use std::collections::BTreeMap;
use std::path::Path;

pub use dicom::DicomExtractor;
pub use error::MetadataError;

/// Keyword -> string value for the elements an extractor understood.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    fields: BTreeMap<String, String>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, keyword: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(keyword.into(), value.into());
    }

    pub fn get(&self, keyword: &str) -> Option<&str> {
        self.fields.get(keyword).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Reads the metadata fields of a file.
///
/// Called from a blocking worker thread, so implementations may do
/// synchronous IO.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<FieldMap, MetadataError>;
}
