//! Storage source routing with catalog fallback.
//!
//! A browse or upload names a logical source: the user's private assets
//! library, the shared catalog ("the Bazaar"), or a native backend owned by
//! the host. The router decides which physical backend actually serves the
//! request and applies the fallback chain that makes package paths resolve
//! against the most specific backend that holds them:
//! native -> catalog -> private library, and back to native if the catalog
//! round trip came up empty.
//!
//! Browse never returns an error. Remote failures collapse into an empty
//! result and a message on the notification side channel; callers treat an
//! empty result as "not found".

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::api::service::AssetService;
use crate::api::types::{BrowseApiOptions, BrowseApiResponse};
use crate::api::ApiError;
use crate::config::ClientConfig;
use crate::notify::Notifier;
use crate::transfer::{AssetUploader, UploadResult, UploadStatus};

/// Media extensions the host can upload; a browse target ending in one of
/// these denotes a file and has its filename stripped before the remote
/// folder listing. `pdf` and `json` are included for module content.
pub const FILE_EXTENSIONS: &[&str] = &[
    "aac", "apng", "avif", "bmp", "flac", "gif", "jpeg", "jpg", "json", "m4a", "m4v", "mid",
    "mp3", "mp4", "ogg", "opus", "pdf", "png", "svg", "tiff", "wav", "webm", "webp",
];

/// Pseudo-directories synthesized for the catalog root, which has no browse
/// semantics of its own.
const CATALOG_ROOTS: &[&str] = &["modules", "systems", "worlds", "assets"];

fn package_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/?(modules|systems|worlds)/.+").expect("static regex"))
}

/// A logical storage source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceId {
    /// The user's private assets library.
    PrivateLibrary,
    /// The shared, read-only catalog.
    SharedCatalog,
    /// A host-owned backend, addressed by name (e.g. "data", "public").
    Native(String),
}

impl SourceId {
    /// Parse a source name, folding the legacy aliases for the library and
    /// the catalog.
    pub fn parse(name: &str) -> Self {
        match name {
            "forgevtt" | "forge-vtt" => SourceId::PrivateLibrary,
            "forge-bazaar" => SourceId::SharedCatalog,
            other => SourceId::Native(other.to_string()),
        }
    }

    /// Re-parse a `Native` id so aliased names collapse to their canonical
    /// variant.
    fn normalized(self) -> Self {
        match self {
            SourceId::Native(name) => SourceId::parse(&name),
            other => other,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SourceId::PrivateLibrary => "forgevtt",
            SourceId::SharedCatalog => "forge-bazaar",
            SourceId::Native(name) => name,
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Caller-supplied browse options.
#[derive(Debug, Clone, Default)]
pub struct BrowseOptions {
    /// The target is a wildcard pattern; it always denotes files.
    pub wildcard: bool,
    /// Extension filter forwarded to the backend.
    pub extensions: Vec<String>,
    /// Browse another user's library (requires sharing permissions).
    pub forge_userid: Option<String>,
    /// Disable fallback routing; the stated source is authoritative.
    pub preserve_source: bool,
}

/// A normalized folder listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrowseResult {
    /// Decoded folder path, without duplicated trailing slashes.
    pub target: String,
    pub dirs: Vec<String>,
    pub files: Vec<String>,
    pub private: bool,
    pub extensions: Vec<String>,
}

impl BrowseResult {
    fn empty(target: impl Into<String>, options: &BrowseOptions) -> Self {
        Self {
            target: target.into(),
            extensions: options.extensions.clone(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }
}

/// A browse/upload/create-directory capability. The host's own storage
/// backend implements this and is handed to the router as the fallback
/// target; the router itself implements the same operations for the remote
/// library and catalog.
#[async_trait]
pub trait StorageBrowser: Send + Sync {
    async fn browse(
        &self,
        source: &str,
        target: &str,
        options: &BrowseOptions,
    ) -> Result<BrowseResult, ApiError>;

    async fn upload(
        &self,
        source: &str,
        target: &str,
        name: &str,
        bytes: Bytes,
    ) -> Result<UploadResult, ApiError>;

    async fn create_directory(&self, source: &str, target: &str) -> Result<(), ApiError>;
}

/// Routes logical sources to physical backends.
pub struct SourceRouter {
    service: Arc<dyn AssetService>,
    uploader: AssetUploader,
    native: Option<Arc<dyn StorageBrowser>>,
    notifier: Arc<dyn Notifier>,
    assets_prefix: String,
    hosted: bool,
    game_slug: Option<String>,
}

impl SourceRouter {
    pub fn new(
        service: Arc<dyn AssetService>,
        notifier: Arc<dyn Notifier>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            uploader: AssetUploader::new(service.clone()),
            service,
            native: None,
            notifier,
            assets_prefix: config.assets_prefix.clone(),
            hosted: config.hosted,
            game_slug: config.game_slug.clone(),
        }
    }

    /// Attach the host's native storage backend as a fallback target.
    pub fn with_native(mut self, native: Arc<dyn StorageBrowser>) -> Self {
        self.native = Some(native);
        self
    }

    pub fn uploader(&self) -> &AssetUploader {
        &self.uploader
    }

    /// Browse a folder, applying source normalization and the fallback
    /// chain. Never returns an error: failures yield an empty result and a
    /// notification.
    pub async fn browse(
        &self,
        source: SourceId,
        target: &str,
        options: BrowseOptions,
    ) -> BrowseResult {
        self.browse_inner(source, target.to_string(), options, None)
            .await
    }

    fn browse_inner(
        &self,
        source: SourceId,
        target: String,
        options: BrowseOptions,
        original_source: Option<SourceId>,
    ) -> BoxFuture<'_, BrowseResult> {
        Box::pin(async move {
            let mut source = source.normalized();

            // A target already inside the assets library overrides the
            // caller's stated source.
            if target.starts_with(&self.assets_prefix) {
                source = SourceId::PrivateLibrary;
            }

            // Catalog-first heuristic: hosted browses of package-relative
            // paths check the shared catalog before the native backend,
            // remembering where to fall back to.
            let mut trying_catalog_first = original_source;
            if self.hosted
                && matches!(source, SourceId::Native(_))
                && !options.preserve_source
                && package_path_re().is_match(&target)
            {
                trying_catalog_first = Some(source);
                source = SourceId::SharedCatalog;
            }

            if let SourceId::Native(name) = &source {
                let preserve = options.preserve_source || !self.hosted;
                match self.native_browse(name, &target, &options).await {
                    Ok(result) => {
                        let found = result.target == target || !result.is_empty();
                        if preserve || found {
                            return result;
                        }
                    }
                    Err(err) => {
                        if preserve {
                            self.notifier.error(&err.user_message());
                            return BrowseResult::empty(target, &options);
                        }
                    }
                }
                // Native browse came back empty; try the user's library.
                source = SourceId::PrivateLibrary;
            }

            self.browse_remote(source, target, options, trying_catalog_first)
                .await
        })
    }

    async fn native_browse(
        &self,
        name: &str,
        target: &str,
        options: &BrowseOptions,
    ) -> Result<BrowseResult, ApiError> {
        match &self.native {
            Some(native) => native.browse(name, target, options).await,
            None => Err(ApiError::Service {
                code: 404,
                message: format!("Unknown storage source: {name}"),
            }),
        }
    }

    /// One remote browse call against the library or catalog, plus the
    /// catalog empty-result fallback.
    async fn browse_remote(
        &self,
        source: SourceId,
        original_target: String,
        options: BrowseOptions,
        trying_catalog_first: Option<SourceId>,
    ) -> BrowseResult {
        let mut api_options = BrowseApiOptions {
            extensions: (!options.extensions.is_empty()).then(|| options.extensions.clone()),
            wildcard: options.wildcard.then(|| original_target.clone()),
            target: Some(original_target.clone()),
            forge_userid: options.forge_userid.clone(),
            forge_game: self.game_slug.clone(),
        };

        // Strip the library prefix, moving the owning-user segment into the
        // request options.
        let mut target = original_target.clone();
        if let Some(rest) = target.strip_prefix(&self.assets_prefix) {
            let mut parts = rest.split('/');
            api_options.forge_userid = parts.next().map(String::from);
            target = parts.collect::<Vec<_>>().join("/");
        }

        // A target denoting a file (or a wildcard pattern, which always
        // does) is browsed at its parent folder.
        let lowered = target.to_lowercase();
        let is_file = FILE_EXTENSIONS
            .iter()
            .any(|ext| lowered.ends_with(&format!(".{ext}")));
        if options.wildcard || is_file {
            target = match target.rsplit_once('/') {
                Some((parent, _)) => parent.to_string(),
                None => String::new(),
            };
        }

        let is_catalog = source == SourceId::SharedCatalog
            || api_options.forge_userid.as_deref() == Some("bazaar");
        if self.hosted && is_catalog {
            target = target.trim_start_matches('/').to_string();
            if target.is_empty() {
                // The catalog root is synthesized, not browsed.
                return BrowseResult {
                    target: String::new(),
                    dirs: CATALOG_ROOTS.iter().map(|d| d.to_string()).collect(),
                    files: Vec::new(),
                    private: false,
                    extensions: options.extensions.clone(),
                };
            }
            let first = target.split('/').next().unwrap_or_default();
            if !CATALOG_ROOTS.contains(&first) {
                return BrowseResult::empty(target, &options);
            }
            api_options.forge_userid = Some("bazaar".to_string());
        }

        let decoded = percent_decode_str(&target).decode_utf8_lossy().into_owned();
        let response = self.service.browse(&decoded, &api_options).await;

        // If the catalog was tried first and came up short, retry: first
        // the user's library, then the original native source.
        if let Some(original) = trying_catalog_first {
            let missed = match &response {
                Err(_) => true,
                Ok(resp) => {
                    (resp.folder != target && format!("{}/", resp.folder) != target)
                        || (resp.files.is_empty() && resp.dirs.is_empty())
                }
            };
            if missed {
                let restored = api_options
                    .wildcard
                    .clone()
                    .or(api_options.target.clone())
                    .unwrap_or(target);
                if source == SourceId::SharedCatalog {
                    let mut retry_options = options.clone();
                    retry_options.forge_userid = None;
                    return self
                        .browse_inner(
                            SourceId::PrivateLibrary,
                            restored,
                            retry_options,
                            Some(original),
                        )
                        .await;
                }
                return match self.native_browse(original.name(), &restored, &options).await {
                    Ok(result) => result,
                    Err(err) => {
                        self.notifier.error(&err.user_message());
                        BrowseResult::empty(restored, &options)
                    }
                };
            }
        }

        match response {
            Ok(resp) => normalize_response(resp, &options),
            Err(err) => {
                self.notifier.error(&err.user_message());
                BrowseResult::empty(target, &options)
            }
        }
    }

    /// Upload one file through the source's backend. The catalog is
    /// read-only; native sources are only writable outside the hosted
    /// deployment.
    pub async fn upload(
        &self,
        source: SourceId,
        target: &str,
        name: &str,
        bytes: Bytes,
    ) -> UploadResult {
        match source.normalized() {
            SourceId::SharedCatalog => {
                let message = "Cannot upload to that folder";
                self.notifier.error(message);
                UploadResult {
                    status: UploadStatus::Failure,
                    path: None,
                    message: message.to_string(),
                }
            }
            SourceId::Native(name_id) if !self.hosted => match &self.native {
                Some(native) => match native.upload(&name_id, target, name, bytes).await {
                    Ok(result) => result,
                    Err(err) => {
                        let message = err.user_message();
                        self.notifier.error(&message);
                        UploadResult {
                            status: UploadStatus::Failure,
                            path: None,
                            message,
                        }
                    }
                },
                None => {
                    let message = format!("Unknown storage source: {name_id}");
                    self.notifier.error(&message);
                    UploadResult {
                        status: UploadStatus::Failure,
                        path: None,
                        message,
                    }
                }
            },
            _ => {
                let result = self.uploader.upload(target, name, bytes).await;
                match result.status {
                    UploadStatus::Success => self.notifier.info(&result.message),
                    UploadStatus::Failure => self.notifier.error(&result.message),
                }
                result
            }
        }
    }

    /// Create a folder. The catalog rejects it; private-library paths go to
    /// the remote service, everything else to the native backend.
    pub async fn create_directory(&self, source: SourceId, target: &str) -> Result<(), ApiError> {
        match source.normalized() {
            SourceId::SharedCatalog => {
                let message = "Cannot create a folder in the catalog";
                self.notifier.error(message);
                Err(ApiError::Service {
                    code: 403,
                    message: message.to_string(),
                })
            }
            SourceId::Native(name) if !self.hosted => match &self.native {
                Some(native) => native.create_directory(&name, target).await,
                None => Err(ApiError::Service {
                    code: 404,
                    message: format!("Unknown storage source: {name}"),
                }),
            },
            _ => {
                if target.is_empty() {
                    return Ok(());
                }
                match self.service.create_folder(target).await {
                    Ok(_) => Ok(()),
                    Err(err) => {
                        self.notifier.error(&err.user_message());
                        Err(err)
                    }
                }
            }
        }
    }
}

/// Normalize a remote listing: decoded folder path, directory entries with
/// the service's trailing slash removed, files flattened to URLs.
fn normalize_response(resp: BrowseApiResponse, options: &BrowseOptions) -> BrowseResult {
    BrowseResult {
        target: percent_decode_str(&resp.folder)
            .decode_utf8_lossy()
            .into_owned(),
        dirs: resp
            .dirs
            .into_iter()
            .map(|d| d.path.strip_suffix('/').unwrap_or(&d.path).to_string())
            .collect(),
        files: resp.files.into_iter().map(|f| f.url).collect(),
        private: true,
        extensions: options.extensions.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_alias_parsing() {
        assert_eq!(SourceId::parse("forgevtt"), SourceId::PrivateLibrary);
        assert_eq!(SourceId::parse("forge-vtt"), SourceId::PrivateLibrary);
        assert_eq!(SourceId::parse("forge-bazaar"), SourceId::SharedCatalog);
        assert_eq!(
            SourceId::parse("data"),
            SourceId::Native("data".to_string())
        );
        assert_eq!(
            SourceId::Native("forge-vtt".to_string()).normalized(),
            SourceId::PrivateLibrary
        );
    }

    #[test]
    fn test_package_path_heuristic() {
        assert!(package_path_re().is_match("/modules/foo/img.png"));
        assert!(package_path_re().is_match("systems/pf2e/icons"));
        assert!(package_path_re().is_match("worlds/my-world/scene.webp"));
        assert!(!package_path_re().is_match("assets/foo.png"));
        assert!(!package_path_re().is_match("modules"));
        assert!(!package_path_re().is_match("/modules/"));
    }

    #[test]
    fn test_normalize_response() {
        use crate::api::types::{DirEntry, FileEntry};
        let resp = BrowseApiResponse {
            folder: "maps/big%20dungeon".to_string(),
            dirs: vec![DirEntry {
                path: "maps/big dungeon/floors/".to_string(),
            }],
            files: vec![FileEntry {
                url: "https://assets.example/u/maps/big dungeon/a.png".to_string(),
            }],
        };
        let result = normalize_response(resp, &BrowseOptions::default());
        assert_eq!(result.target, "maps/big dungeon");
        assert_eq!(result.dirs, vec!["maps/big dungeon/floors"]);
        assert_eq!(result.files.len(), 1);
        assert!(result.private);
    }
}
