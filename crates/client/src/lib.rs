//! Client library for a remote asset storage service.
//!
//! The service is content-addressed: every file is identified by a chunked
//! MD5 fingerprint, duplicate uploads are resolved to the already-stored
//! copy without moving bytes, and browsing spans both a user's private
//! library and a shared read-only catalog of published packages.
//!
//! The main pieces:
//! - [`etag`] computes the chunked fingerprint the service's dedup index
//!   keys on.
//! - [`api`] is the HTTP envelope: auth headers, the response envelope,
//!   and the [`api::service::AssetService`] trait the rest of the crate
//!   talks through.
//! - [`transfer`] registers assets before uploading and batches the
//!   transfers that remain.
//! - [`router`] resolves browse/upload/mkdir requests across the private
//!   library, the shared catalog, and any native storage backend.
//! - [`documents`] rewrites inline base64 images in host documents to
//!   stored asset URLs.

pub mod api;
pub mod config;
pub mod documents;
pub mod etag;
pub mod notify;
pub mod router;
pub mod session;
pub mod transfer;

pub mod prelude {
    pub use crate::api::service::{AssetService, HttpAssetService};
    pub use crate::api::{ApiClient, ApiError, Progress, ProgressSink};
    pub use crate::config::ClientConfig;
    pub use crate::documents::{DocumentKind, DocumentNode, ImageMigrator};
    pub use crate::etag::{etag_from_bytes, etag_from_reader, Etag};
    pub use crate::notify::{LogNotifier, Notifier};
    pub use crate::router::{BrowseOptions, BrowseResult, SourceId, SourceRouter, StorageBrowser};
    pub use crate::session::SessionContext;
    pub use crate::transfer::{
        AssetUploader, FailurePolicy, UploadFile, UploadResult, UploadStatus,
    };
}
