use std::sync::Arc;

use async_trait::async_trait;

mod dispatch;
pub use dispatch::*;
mod error;
pub use error::*;
mod registry;
pub use registry::*;
pub mod subject;

mod email;
pub use email::*;
mod log;
pub use log::*;
mod webhook;
pub use webhook::*;

use crate::template::AlertBatch;

/// The one capability every notifier kind provides: deliver a list of
/// batches and report every delivery failure, never just the first.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn kind(&self) -> &str;
    async fn notify(&self, batches: &[AlertBatch]) -> Vec<DeliveryError>;
}

impl std::fmt::Debug for dyn Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").field("kind", &self.kind()).finish()
    }
}

/// Wires every built-in notifier kind into the registry. Called once at
/// startup, before any lookup.
pub fn register_builtins(
    registry: &Registry,
    email_sender: Arc<dyn EmailSender>,
    http: reqwest::Client,
) -> Result<(), ConfigError> {
    registry.register(EMAIL_KIND, EmailNotifier::factory(email_sender))?;
    registry.register(WEBHOOK_KIND, WebhookNotifier::factory(http))?;
    Ok(())
}
