use std::convert::Infallible;
use std::fmt::Write as _;

use clap::Args;
use client::router::{BrowseOptions, SourceId};

/// List a folder in the asset library or the public catalog.
#[derive(Args, Debug, Clone)]
pub struct Browse {
    /// Folder path, or a wildcard pattern with `--wildcard`
    pub target: String,

    /// Source to browse: forgevtt, forge-bazaar, or a native source name
    #[arg(long, default_value = "forgevtt")]
    pub source: String,

    /// Treat the target as a wildcard pattern over file paths
    #[arg(long)]
    pub wildcard: bool,

    /// Only list files with these extensions (repeatable)
    #[arg(long = "extension")]
    pub extensions: Vec<String>,

    /// Browse another user's shared library
    #[arg(long)]
    pub user: Option<String>,

    /// Do not fall back to other sources when the folder is missing
    #[arg(long)]
    pub preserve_source: bool,
}

#[async_trait::async_trait]
impl crate::op::Op for Browse {
    // Browsing reports failures through notifications and yields an empty
    // listing instead of an error.
    type Error = Infallible;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<String, Infallible> {
        let options = BrowseOptions {
            wildcard: self.wildcard,
            extensions: self.extensions.clone(),
            forge_userid: self.user.clone(),
            preserve_source: self.preserve_source,
        };
        let result = ctx
            .router
            .browse(SourceId::parse(&self.source), &self.target, options)
            .await;

        let mut out = String::new();
        let _ = writeln!(out, "{}:", result.target);
        for dir in &result.dirs {
            let _ = writeln!(out, "  {dir}/");
        }
        for file in &result.files {
            let _ = writeln!(out, "  {file}");
        }
        if result.is_empty() {
            let _ = writeln!(out, "  (empty)");
        }
        Ok(out)
    }
}
