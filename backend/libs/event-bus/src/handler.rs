use async_trait::async_trait;
use event_schema::EventMessage;

/// Application callback bound to a subscription.
///
/// Handlers run one delivery at a time per subscription. Under the default
/// ack policy a delivery may be handed to the same handler more than once,
/// so handlers must tolerate redelivery.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable name used in logs, metrics and deduplication keys
    fn name(&self) -> &str;

    async fn handle(&self, message: &EventMessage) -> anyhow::Result<()>;
}
