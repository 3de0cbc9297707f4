//! In-memory doubles for the service trait and the notification sink.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use client::api::service::{AssetService, TransferPart};
use client::api::types::{
    AssetDescriptor, BrowseApiOptions, BrowseApiResponse, CreateAssetResult, CreateAssetsResponse,
    DirEntry, FileEntry, NewFolderResponse, SessionStatus, TransferResponse, TransferredFile,
};
use client::api::{ApiError, ProgressSink};
use client::notify::Notifier;
use client::router::{BrowseOptions, BrowseResult, StorageBrowser};
use client::transfer::UploadResult;

/// A folder listing the mock service will answer with.
#[derive(Debug, Clone, Default)]
pub struct MockFolder {
    pub folder: String,
    pub dirs: Vec<String>,
    pub files: Vec<String>,
}

/// [`AssetService`] backed by maps, with call recording.
#[derive(Default)]
pub struct MockAssetService {
    /// Etags the service already holds, mapped to their stored URLs.
    pub stored: Mutex<HashMap<String, String>>,
    /// Etags whose registration reports a per-asset error.
    pub rejected: Mutex<HashSet<String>>,
    /// Browse answers keyed by the requested (decoded) path and the
    /// owning-user option.
    pub folders: Mutex<HashMap<(String, Option<String>), MockFolder>>,
    /// Registration fails at the service level when set.
    pub fail_create: AtomicBool,
    /// Transfers fail when set.
    pub fail_transfers: AtomicBool,

    pub create_calls: AtomicUsize,
    pub single_transfers: AtomicUsize,
    /// Part count of each batch transfer, in order.
    pub batch_transfers: Mutex<Vec<usize>>,
    /// `(path, forge_userid)` of every browse call.
    pub browse_calls: Mutex<Vec<(String, Option<String>)>>,
    pub created_folders: Mutex<Vec<String>>,
}

impl MockAssetService {
    pub fn with_stored(self, etag: &str, url: &str) -> Self {
        self.stored
            .lock()
            .unwrap()
            .insert(etag.to_string(), url.to_string());
        self
    }

    pub fn with_rejected(self, etag: &str) -> Self {
        self.rejected.lock().unwrap().insert(etag.to_string());
        self
    }

    pub fn with_folder(self, path: &str, folder: MockFolder) -> Self {
        self.with_folder_for(path, None, folder)
    }

    pub fn with_folder_for(self, path: &str, userid: Option<&str>, folder: MockFolder) -> Self {
        self.folders
            .lock()
            .unwrap()
            .insert((path.to_string(), userid.map(String::from)), folder);
        self
    }

    pub fn transfer_count(&self) -> usize {
        self.single_transfers.load(Ordering::SeqCst)
            + self
                .batch_transfers
                .lock()
                .unwrap()
                .iter()
                .sum::<usize>()
    }

    fn transfer_url(path: &str) -> String {
        format!("https://assets.example.com/u/{path}")
    }
}

#[async_trait]
impl AssetService for MockAssetService {
    async fn status(&self) -> Result<SessionStatus, ApiError> {
        Ok(SessionStatus::default())
    }

    async fn browse(
        &self,
        path: &str,
        options: &BrowseApiOptions,
    ) -> Result<BrowseApiResponse, ApiError> {
        self.browse_calls
            .lock()
            .unwrap()
            .push((path.to_string(), options.forge_userid.clone()));
        let folders = self.folders.lock().unwrap();
        let key = (path.to_string(), options.forge_userid.clone());
        match folders.get(&key) {
            Some(folder) => Ok(BrowseApiResponse {
                folder: folder.folder.clone(),
                dirs: folder
                    .dirs
                    .iter()
                    .map(|d| DirEntry { path: d.clone() })
                    .collect(),
                files: folder
                    .files
                    .iter()
                    .map(|f| FileEntry { url: f.clone() })
                    .collect(),
            }),
            None => Err(ApiError::Service {
                code: 404,
                message: format!("Folder not found: {path}"),
            }),
        }
    }

    async fn create_assets(
        &self,
        descriptors: &[AssetDescriptor],
    ) -> Result<CreateAssetsResponse, ApiError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ApiError::Service {
                code: 500,
                message: "Asset registration unavailable".to_string(),
            });
        }
        let stored = self.stored.lock().unwrap();
        let rejected = self.rejected.lock().unwrap();
        let results = descriptors
            .iter()
            .map(|descriptor| {
                if rejected.contains(&descriptor.etag) {
                    CreateAssetResult {
                        url: None,
                        error: Some(format!("Invalid asset: {}", descriptor.path)),
                    }
                } else if let Some(url) = stored.get(&descriptor.etag) {
                    CreateAssetResult {
                        url: Some(url.clone()),
                        error: None,
                    }
                } else {
                    CreateAssetResult::default()
                }
            })
            .collect();
        Ok(CreateAssetsResponse { results })
    }

    async fn upload_one(
        &self,
        path: &str,
        _name: &str,
        bytes: Bytes,
        _progress: Option<ProgressSink>,
    ) -> Result<TransferResponse, ApiError> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(ApiError::Service {
                code: 500,
                message: "Transfer failed".to_string(),
            });
        }
        self.single_transfers.fetch_add(1, Ordering::SeqCst);
        let url = Self::transfer_url(path);
        self.stored
            .lock()
            .unwrap()
            .insert(client::etag::etag_from_bytes(&bytes), url.clone());
        Ok(TransferResponse {
            url: Some(url),
            results: None,
        })
    }

    async fn upload_batch(&self, parts: Vec<TransferPart>) -> Result<TransferResponse, ApiError> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(ApiError::Service {
                code: 500,
                message: "Transfer failed".to_string(),
            });
        }
        self.batch_transfers.lock().unwrap().push(parts.len());
        let mut stored = self.stored.lock().unwrap();
        let results = parts
            .iter()
            .map(|part| {
                let url = Self::transfer_url(&part.path);
                stored.insert(client::etag::etag_from_bytes(&part.bytes), url.clone());
                TransferredFile { url: Some(url) }
            })
            .collect();
        Ok(TransferResponse {
            url: None,
            results: Some(results),
        })
    }

    async fn create_folder(&self, path: &str) -> Result<NewFolderResponse, ApiError> {
        self.created_folders.lock().unwrap().push(path.to_string());
        Ok(NewFolderResponse { success: true })
    }
}

/// [`StorageBrowser`] with scripted listings per target path.
#[derive(Default)]
pub struct MockBrowser {
    pub folders: Mutex<HashMap<String, BrowseResult>>,
    pub browse_calls: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

impl MockBrowser {
    pub fn with_folder(self, target: &str, result: BrowseResult) -> Self {
        self.folders
            .lock()
            .unwrap()
            .insert(target.to_string(), result);
        self
    }
}

#[async_trait]
impl StorageBrowser for MockBrowser {
    async fn browse(
        &self,
        source: &str,
        target: &str,
        _options: &BrowseOptions,
    ) -> Result<BrowseResult, ApiError> {
        self.browse_calls
            .lock()
            .unwrap()
            .push((source.to_string(), target.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(ApiError::Service {
                code: 500,
                message: "Native storage unavailable".to_string(),
            });
        }
        let folders = self.folders.lock().unwrap();
        Ok(folders.get(target).cloned().unwrap_or(BrowseResult {
            target: target.to_string(),
            ..Default::default()
        }))
    }

    async fn upload(
        &self,
        _source: &str,
        target: &str,
        name: &str,
        _bytes: Bytes,
    ) -> Result<UploadResult, ApiError> {
        Ok(UploadResult::success(format!("{target}/{name}")))
    }

    async fn create_directory(&self, _source: &str, _target: &str) -> Result<(), ApiError> {
        Ok(())
    }
}

/// [`Notifier`] that records messages for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    pub infos: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}
