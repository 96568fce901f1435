//! Error types for metadata extraction.

use std::path::PathBuf;
use thiserror::Error;

/// Why a file's metadata could not be read. Never fatal; the file is skipped.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a DICOM file (no DICM preamble or file meta group)")]
    NotDicom { path: PathBuf },

    #[error("{path} uses unsupported transfer syntax {uid}")]
    UnsupportedTransferSyntax { path: PathBuf, uid: String },

    #[error("{path} is malformed: {reason}")]
    Malformed { path: PathBuf, reason: String },
}
