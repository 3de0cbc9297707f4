use clap::Args;

/// Query the session status endpoint and print what the service reports.
#[derive(Args, Debug, Clone)]
pub struct Status {}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error(transparent)]
    Api(#[from] client::api::ApiError),
    #[error("status did not serialize: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::op::Op for Status {
    type Error = StatusError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<String, StatusError> {
        let status = ctx.service.api().status().await?;
        Ok(serde_json::to_string_pretty(&status)?)
    }
}
