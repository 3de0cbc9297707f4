//! Wire types for the asset service API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A file identified for registration: where it should live, how big it is,
/// and what its content fingerprint is. Two descriptors with equal etags are
/// the same content regardless of path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub path: String,
    pub size: u64,
    pub etag: String,
}

/// Body of `assets/create`.
#[derive(Debug, Serialize)]
pub struct CreateAssetsRequest<'a> {
    pub assets: &'a [AssetDescriptor],
}

/// Per-descriptor outcome of `assets/create`.
///
/// `url` set: identical content already exists, no transfer needed.
/// `url` null and no error: the service expects the bytes to be uploaded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAssetResult {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateAssetsResponse {
    #[serde(default)]
    pub results: Vec<CreateAssetResult>,
}

/// Options forwarded with `assets/browse`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BrowseApiOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    /// Full wildcard pattern when the caller asked for a wildcard match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wildcard: Option<String>,
    /// The caller's original target, before filename stripping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Owning user of the browsed library, or "bazaar" for the catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forge_userid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forge_game: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirEntry {
    /// Directory path; the service returns these with a trailing slash.
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileEntry {
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct BrowseApiResponse {
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub dirs: Vec<DirEntry>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

/// Response of the raw transfer endpoint: `url` for single-file uploads,
/// `results` for batches.
#[derive(Debug, Default, Deserialize)]
pub struct TransferResponse {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<TransferredFile>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferredFile {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewFolderResponse {
    #[serde(default)]
    pub success: bool,
}

/// Session metadata returned by the unauthenticated status call. Calling it
/// also refreshes the session cookies, which is why auth resolution hits it
/// when cookie-sourced keys are absent or expired.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStatus {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default, rename = "isGM")]
    pub is_gm: bool,
    #[serde(default, rename = "isOwner")]
    pub is_owner: bool,
    #[serde(default)]
    pub autojoin: bool,
    /// Feature-availability flags and anything else the service reports.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
