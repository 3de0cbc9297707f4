use std::sync::Arc;

use client::api::service::HttpAssetService;
use client::api::{ApiClient, ApiError};
use client::config::ClientConfig;
use client::notify::LogNotifier;
use client::router::SourceRouter;

/// Shared context handed to every command: the HTTP-backed service and a
/// router over it.
pub struct OpContext {
    pub service: Arc<HttpAssetService>,
    pub router: SourceRouter,
}

impl OpContext {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let api = ApiClient::new(config.clone())?;
        let service = Arc::new(HttpAssetService::new(api));
        let router = SourceRouter::new(service.clone(), Arc::new(LogNotifier), &config);
        Ok(Self { service, router })
    }
}

#[async_trait::async_trait]
pub trait Op {
    type Error: std::error::Error + Send + Sync + 'static;
    type Output: std::fmt::Display;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

/// Builds the `Command` enum and its dispatch from `(Variant, OpType)`
/// pairs.
#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $op:ty)),* $(,)?) => {
        #[derive(::clap::Subcommand, Debug)]
        pub enum Command {
            $($variant($op),)*
        }

        impl Command {
            pub async fn execute(
                self,
                ctx: &$crate::op::OpContext,
            ) -> ::anyhow::Result<String> {
                match self {
                    $(Command::$variant(op) => {
                        Ok($crate::op::Op::execute(&op, ctx).await?.to_string())
                    })*
                }
            }
        }
    };
}
