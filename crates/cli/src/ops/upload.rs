use std::fmt::Write as _;
use std::path::PathBuf;

use bytes::Bytes;
use clap::Args;
use client::transfer::{AssetUploader, FailurePolicy, UploadFile};

/// Upload files to a folder in the asset library. Files whose content is
/// already stored are resolved without transferring any bytes.
#[derive(Args, Debug, Clone)]
pub struct Upload {
    /// Destination folder in the library
    #[arg(long, default_value = "")]
    pub target: String,

    /// Files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Keep uploading remaining batches when one fails
    #[arg(long)]
    pub keep_going: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadCmdError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("not a usable filename: {0}")]
    BadName(String),
    #[error(transparent)]
    Upload(#[from] client::transfer::UploadError),
}

#[async_trait::async_trait]
impl crate::op::Op for Upload {
    type Error = UploadCmdError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<String, UploadCmdError> {
        let mut files = Vec::with_capacity(self.files.len());
        for path in &self.files {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| UploadCmdError::BadName(path.display().to_string()))?;
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|source| UploadCmdError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
            files.push(UploadFile {
                target: self.target.clone(),
                name: name.to_string(),
                bytes: Bytes::from(bytes),
            });
        }

        let policy = if self.keep_going {
            FailurePolicy::Partial
        } else {
            FailurePolicy::FailFast
        };
        let uploader = AssetUploader::new(ctx.service.clone()).with_policy(policy);
        let urls = uploader.upload_many(&files).await?;

        let mut out = String::new();
        for (file, url) in files.iter().zip(urls) {
            match url {
                Some(url) => {
                    let _ = writeln!(out, "{} -> {url}", file.name);
                }
                None => {
                    let _ = writeln!(out, "{} -> (failed)", file.name);
                }
            }
        }
        Ok(out)
    }
}
