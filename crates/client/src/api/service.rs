//! Typed capability surface over the raw API client.
//!
//! Everything above this layer (routing, dedup uploads, migration) depends
//! on the [`AssetService`] trait rather than on HTTP, so tests can swap in
//! an in-memory service and the transport stays in one place.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Serialize;

use super::types::{
    AssetDescriptor, BrowseApiOptions, BrowseApiResponse, CreateAssetsRequest,
    CreateAssetsResponse, NewFolderResponse, SessionStatus, TransferResponse,
};
use super::{ApiClient, ApiError, ProgressSink};

/// One file in a batched transfer.
#[derive(Debug, Clone)]
pub struct TransferPart {
    /// Full destination path, including the filename.
    pub path: String,
    /// Filename reported in the multipart form.
    pub name: String,
    pub bytes: Bytes,
}

/// The remote asset service's operations, as consumed by the router, the
/// uploader, and the migrator.
#[async_trait]
pub trait AssetService: Send + Sync {
    /// Unauthenticated status/bootstrap call; refreshes session cookies.
    async fn status(&self) -> Result<SessionStatus, ApiError>;

    /// List a library or catalog folder.
    async fn browse(
        &self,
        path: &str,
        options: &BrowseApiOptions,
    ) -> Result<BrowseApiResponse, ApiError>;

    /// Register descriptors with the dedup index. Per-descriptor results
    /// are aligned with the input.
    async fn create_assets(
        &self,
        descriptors: &[AssetDescriptor],
    ) -> Result<CreateAssetsResponse, ApiError>;

    /// Transfer one file's bytes.
    async fn upload_one(
        &self,
        path: &str,
        name: &str,
        bytes: Bytes,
        progress: Option<ProgressSink>,
    ) -> Result<TransferResponse, ApiError>;

    /// Transfer a batch of files in a single request.
    async fn upload_batch(&self, parts: Vec<TransferPart>) -> Result<TransferResponse, ApiError>;

    /// Create a folder in the user's library.
    async fn create_folder(&self, path: &str) -> Result<NewFolderResponse, ApiError>;
}

#[derive(Serialize)]
struct BrowseRequestBody<'a> {
    path: &'a str,
    options: &'a BrowseApiOptions,
}

#[derive(Serialize)]
struct NewFolderRequestBody<'a> {
    path: &'a str,
}

/// [`AssetService`] over HTTP.
pub struct HttpAssetService {
    api: ApiClient,
}

impl HttpAssetService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    fn file_part(name: &str, bytes: Bytes) -> Result<Part, ApiError> {
        let mime = mime_guess::from_path(name).first_or_octet_stream();
        let part = Part::stream(bytes)
            .file_name(name.to_string())
            .mime_str(mime.essence_str())?;
        Ok(part)
    }
}

#[async_trait]
impl AssetService for HttpAssetService {
    async fn status(&self) -> Result<SessionStatus, ApiError> {
        self.api.status().await
    }

    async fn browse(
        &self,
        path: &str,
        options: &BrowseApiOptions,
    ) -> Result<BrowseApiResponse, ApiError> {
        self.api
            .post_json("assets/browse", &BrowseRequestBody { path, options })
            .await
    }

    async fn create_assets(
        &self,
        descriptors: &[AssetDescriptor],
    ) -> Result<CreateAssetsResponse, ApiError> {
        self.api
            .post_json(
                "assets/create",
                &CreateAssetsRequest {
                    assets: descriptors,
                },
            )
            .await
    }

    async fn upload_one(
        &self,
        path: &str,
        name: &str,
        bytes: Bytes,
        progress: Option<ProgressSink>,
    ) -> Result<TransferResponse, ApiError> {
        let endpoint = self.api.config().upload_endpoint.clone();
        let form = Form::new()
            .text("path", path.to_string())
            .part("file", Self::file_part(name, bytes)?);
        self.api.post_form(&endpoint, form, progress).await
    }

    async fn upload_batch(&self, parts: Vec<TransferPart>) -> Result<TransferResponse, ApiError> {
        let endpoint = self.api.config().upload_endpoint.clone();
        let mut form = Form::new();
        for TransferPart { path, name, bytes } in parts {
            form = form
                .text("paths[]", path)
                .part("files[]", Self::file_part(&name, bytes)?);
        }
        self.api.post_form(&endpoint, form, None).await
    }

    async fn create_folder(&self, path: &str) -> Result<NewFolderResponse, ApiError> {
        self.api
            .post_json("assets/new-folder", &NewFolderRequestBody { path })
            .await
    }
}
