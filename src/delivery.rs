//! Upload of stable files to routing endpoints.
//!
//! One attempt per (file, endpoint). Anything other than HTTP 200 is a
//! failure; failures are reported to the caller and never retried.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;

/// Why a single dispatch failed.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Request to {endpoint} timed out")]
    Timeout { endpoint: Url },

    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("Status code: {status}")]
    Status { status: StatusCode },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Result of one dispatch, as logged by the pipeline.
#[derive(Debug)]
pub struct DeliveryOutcome {
    pub path: PathBuf,
    pub endpoint: Url,
    pub error: Option<DeliveryError>,
}

impl DeliveryOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Sends a file to an endpoint.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, path: &Path, endpoint: &Url) -> Result<(), DeliveryError>;
}

/// Multipart HTTP POST delivery.
///
/// The file is sent as a single part named after `form_field`, with the
/// file's base name as filename.
#[derive(Debug, Clone)]
pub struct HttpDelivery {
    client: Client,
    form_field: String,
}

impl HttpDelivery {
    pub fn new(timeout: Duration, form_field: impl Into<String>) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dicom-router/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DeliveryError::Client)?;

        Ok(Self {
            client,
            form_field: form_field.into(),
        })
    }
}

#[async_trait]
impl Delivery for HttpDelivery {
    async fn deliver(&self, path: &Path, endpoint: &Url) -> Result<(), DeliveryError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| DeliveryError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let part = Part::bytes(bytes).file_name(file_name);
        let form = Form::new().part(self.form_field.clone(), part);

        let response = self
            .client
            .post(endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|source| {
                if source.is_timeout() {
                    DeliveryError::Timeout {
                        endpoint: endpoint.clone(),
                    }
                } else {
                    DeliveryError::Transport {
                        endpoint: endpoint.clone(),
                        source,
                    }
                }
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(DeliveryError::Status { status }),
        }
    }
}
