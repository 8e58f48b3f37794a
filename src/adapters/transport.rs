use async_trait::async_trait;
use tracing::info;

use crate::error::Result;

/// Outbound message transport (chat bot, webhook, ...)
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Deliver one rendered message. A returned error counts as one failed try.
    async fn send(&self, text: &str) -> Result<()>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Transport that writes messages to the log instead of a remote service
#[derive(Debug, Default, Clone)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn send(&self, text: &str) -> Result<()> {
        info!(target: "bulwark::notifications", "{}", text.replace('\n', " | "));
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
