use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use client::documents::{DocumentKind, DocumentNode, ImageMigrator, UnknownDocumentKind};
use client::transfer::AssetUploader;

/// Rewrite inline base64 images in a document's JSON to stored asset URLs.
/// Reads the document from a file or stdin, prints the migrated JSON.
#[derive(Args, Debug, Clone)]
pub struct Migrate {
    /// Document kind: Actor, Scene, JournalEntry, ...
    pub kind: String,

    /// Read the document from this file instead of stdin
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Write the migrated document here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error(transparent)]
    Kind(#[from] UnknownDocumentKind),
    #[error("could not read document: {0}")]
    Read(std::io::Error),
    #[error("could not write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("document is not valid JSON for that kind: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::op::Op for Migrate {
    type Error = MigrateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<String, MigrateError> {
        let kind: DocumentKind = self.kind.parse()?;
        let raw = match &self.input {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(MigrateError::Read)?,
            None => {
                use tokio::io::AsyncReadExt;
                let mut buf = String::new();
                tokio::io::stdin()
                    .read_to_string(&mut buf)
                    .await
                    .map_err(MigrateError::Read)?;
                buf
            }
        };

        let node = DocumentNode::from_value(kind, serde_json::from_str(&raw)?)?;
        let migrator = ImageMigrator::new(Arc::new(AssetUploader::new(ctx.service.clone())));
        let migrated = migrator.migrate(node).await;
        let json = serde_json::to_string_pretty(&migrated.into_value()?)?;

        match &self.output {
            Some(path) => {
                tokio::fs::write(path, json.as_bytes())
                    .await
                    .map_err(|source| MigrateError::Write {
                        path: path.display().to_string(),
                        source,
                    })?;
                Ok(format!("Wrote {}", path.display()))
            }
            None => Ok(json),
        }
    }
}
