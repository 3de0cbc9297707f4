//! Dedup-aware upload pipeline.
//!
//! Nothing is ever uploaded blind: every file is first registered with the
//! dedup index (`assets/create`) under its content etag, and bytes are only
//! transferred for descriptors the service does not already hold. The
//! registration call is all-or-none per operation; transfers are batched by
//! cumulative body size.

use std::sync::Arc;

use bytes::Bytes;

use crate::api::service::{AssetService, TransferPart};
use crate::api::types::{AssetDescriptor, CreateAssetResult};
use crate::api::{ApiError, ProgressSink};
use crate::etag::etag_from_bytes;

/// Maximum descriptors per `assets/create` call.
pub const CREATE_BATCH_SIZE: usize = 100;
/// Cumulative body size after which a transfer batch is flushed.
pub const TRANSFER_BATCH_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("asset registration failed: {0}")]
    Registration(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Per-descriptor registration outcome, aligned with the request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Identical content already stored; the URL is authoritative and no
    /// bytes need to move.
    Exists(String),
    /// The service expects this descriptor's bytes.
    NeedsUpload,
    /// The service rejected this descriptor.
    Failed(String),
}

impl From<CreateAssetResult> for RegistrationOutcome {
    fn from(result: CreateAssetResult) -> Self {
        match (result.error, result.url) {
            (Some(error), _) => RegistrationOutcome::Failed(error),
            (None, Some(url)) => RegistrationOutcome::Exists(url),
            (None, None) => RegistrationOutcome::NeedsUpload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Success,
    Failure,
}

/// Outcome of a single-file upload.
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub status: UploadStatus,
    pub path: Option<String>,
    pub message: String,
}

impl UploadResult {
    pub fn success(url: impl Into<String>) -> Self {
        Self {
            status: UploadStatus::Success,
            path: Some(url.into()),
            message: "File uploaded to your assets library successfully".to_string(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: UploadStatus::Failure,
            path: None,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == UploadStatus::Success
    }
}

/// What to do when a transfer batch fails partway through `upload_many`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the whole operation. Earlier batches' work is not invalidated
    /// server-side, but the call reports failure.
    #[default]
    FailFast,
    /// Mark only the failed batch's entries as failed and keep going; dedup
    /// hits and earlier batches stay resolved.
    Partial,
}

/// One file in an `upload_many` request.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Destination folder.
    pub target: String,
    /// Filename within the folder.
    pub name: String,
    pub bytes: Bytes,
}

impl UploadFile {
    fn path(&self) -> String {
        format!("{}/{}", self.target, self.name)
    }

    fn descriptor(&self) -> AssetDescriptor {
        AssetDescriptor {
            path: self.path(),
            size: self.bytes.len() as u64,
            etag: etag_from_bytes(&self.bytes),
        }
    }
}

/// Registration client and upload transport over an [`AssetService`].
pub struct AssetUploader {
    service: Arc<dyn AssetService>,
    policy: FailurePolicy,
}

impl AssetUploader {
    pub fn new(service: Arc<dyn AssetService>) -> Self {
        Self {
            service,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Register descriptors with the dedup index, in batches of at most
    /// [`CREATE_BATCH_SIZE`].
    ///
    /// The returned outcomes match the input in order and length. A
    /// service-level error on any batch aborts the whole operation: callers
    /// must not act on partial registration results.
    pub async fn register(
        &self,
        descriptors: &[AssetDescriptor],
    ) -> Result<Vec<RegistrationOutcome>, UploadError> {
        let mut outcomes = Vec::with_capacity(descriptors.len());
        for batch in descriptors.chunks(CREATE_BATCH_SIZE) {
            let response = self.service.create_assets(batch).await?;
            if response.results.len() != batch.len() {
                return Err(UploadError::Registration(format!(
                    "registration returned {} results for {} descriptors",
                    response.results.len(),
                    batch.len()
                )));
            }
            outcomes.extend(response.results.into_iter().map(RegistrationOutcome::from));
        }
        Ok(outcomes)
    }

    /// Upload one file, skipping the byte transfer entirely when identical
    /// content is already stored.
    pub async fn upload(&self, target: &str, name: &str, bytes: Bytes) -> UploadResult {
        self.upload_with_progress(target, name, bytes, None).await
    }

    pub async fn upload_with_progress(
        &self,
        target: &str,
        name: &str,
        bytes: Bytes,
        progress: Option<ProgressSink>,
    ) -> UploadResult {
        let file = UploadFile {
            target: target.to_string(),
            name: name.to_string(),
            bytes,
        };
        let descriptor = file.descriptor();
        let outcomes = match self.register(std::slice::from_ref(&descriptor)).await {
            Ok(outcomes) => outcomes,
            Err(err) => {
                tracing::error!("registration failed for {}: {err}", descriptor.path);
                return UploadResult::failure(user_message(&err));
            }
        };
        match outcomes.into_iter().next() {
            Some(RegistrationOutcome::Exists(url)) => {
                tracing::debug!("dedup hit for {}: {url}", descriptor.path);
                UploadResult::success(url)
            }
            Some(RegistrationOutcome::NeedsUpload) => {
                let response = self
                    .service
                    .upload_one(&descriptor.path, &file.name, file.bytes, progress)
                    .await;
                match response {
                    Ok(response) => match response.url {
                        Some(url) => UploadResult::success(url),
                        None => UploadResult::failure("Transfer returned no asset URL"),
                    },
                    Err(err) => {
                        tracing::error!("transfer failed for {}: {err}", descriptor.path);
                        UploadResult::failure(user_message(&UploadError::Api(err)))
                    }
                }
            }
            Some(RegistrationOutcome::Failed(reason)) => UploadResult::failure(reason),
            None => UploadResult::failure("Registration returned no result"),
        }
    }

    /// Upload many files at once.
    ///
    /// Returns URLs aligned index-for-index with the input, `None` marking
    /// entries that could not be resolved. Registration is performed for
    /// all files first; only descriptors the service does not already hold
    /// are transferred, in batches bounded by [`TRANSFER_BATCH_BYTES`].
    /// Transfer failures follow the configured [`FailurePolicy`].
    pub async fn upload_many(
        &self,
        files: &[UploadFile],
    ) -> Result<Vec<Option<String>>, UploadError> {
        let descriptors: Vec<AssetDescriptor> = files.iter().map(UploadFile::descriptor).collect();
        let outcomes = self.register(&descriptors).await?;

        let mut resolved: Vec<Option<String>> = outcomes
            .iter()
            .map(|outcome| match outcome {
                RegistrationOutcome::Exists(url) => Some(url.clone()),
                _ => None,
            })
            .collect();

        // Stream only the descriptors the service asked for, flushing when
        // the accumulated body size passes the batch bound.
        let mut pending: Vec<(usize, TransferPart)> = Vec::new();
        let mut pending_bytes = 0usize;
        for (index, outcome) in outcomes.iter().enumerate() {
            if !matches!(outcome, RegistrationOutcome::NeedsUpload) {
                continue;
            }
            let file = &files[index];
            pending_bytes += file.bytes.len();
            pending.push((
                index,
                TransferPart {
                    path: file.path(),
                    name: file.name.clone(),
                    bytes: file.bytes.clone(),
                },
            ));
            if pending_bytes > TRANSFER_BATCH_BYTES {
                self.flush_batch(&mut pending, &mut resolved).await?;
                pending_bytes = 0;
            }
        }
        if !pending.is_empty() {
            self.flush_batch(&mut pending, &mut resolved).await?;
        }

        let uploaded = resolved.iter().filter(|url| url.is_some()).count();
        tracing::info!("uploaded {uploaded}/{} files to the assets library", files.len());
        Ok(resolved)
    }

    async fn flush_batch(
        &self,
        pending: &mut Vec<(usize, TransferPart)>,
        resolved: &mut [Option<String>],
    ) -> Result<(), UploadError> {
        let batch = std::mem::take(pending);
        let indices: Vec<usize> = batch.iter().map(|(index, _)| *index).collect();
        let parts: Vec<TransferPart> = batch.into_iter().map(|(_, part)| part).collect();
        match self.service.upload_batch(parts).await {
            Ok(response) => {
                let results = response.results.unwrap_or_default();
                for (slot, result) in indices.iter().zip(results) {
                    resolved[*slot] = result.url;
                }
                Ok(())
            }
            Err(err) => match self.policy {
                FailurePolicy::FailFast => Err(UploadError::Api(err)),
                FailurePolicy::Partial => {
                    tracing::warn!("transfer batch of {} files failed: {err}", indices.len());
                    Ok(())
                }
            },
        }
    }
}

fn user_message(err: &UploadError) -> String {
    match err {
        UploadError::Api(api) => api.user_message(),
        other => other.to_string(),
    }
}
