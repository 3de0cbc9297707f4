//! User-facing notification side channel.
//!
//! Browse and upload errors are surfaced to the user as transient messages
//! rather than propagated as errors, so the UI always has a renderable
//! result. The host edge injects its own implementation; the default routes
//! messages to the log.

/// Sink for transient user-visible messages.
pub trait Notifier: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Default notifier backed by `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn info(&self, message: &str) {
        tracing::info!(target: "forge_assets::notify", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "forge_assets::notify", "{message}");
    }
}
