use clap::Args;
use client::router::SourceId;

/// Create a folder in the asset library.
#[derive(Args, Debug, Clone)]
pub struct NewFolder {
    /// Folder path to create
    pub target: String,

    /// Source to create the folder in
    #[arg(long, default_value = "forgevtt")]
    pub source: String,
}

#[async_trait::async_trait]
impl crate::op::Op for NewFolder {
    type Error = client::api::ApiError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<String, Self::Error> {
        ctx.router
            .create_directory(SourceId::parse(&self.source), &self.target)
            .await?;
        Ok(format!("Created {}", self.target))
    }
}
