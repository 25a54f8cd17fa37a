use async_trait::async_trait;
use event_bus::EventHandler;
use event_schema::EventMessage;
use serde_json::json;

use crate::guard::{IdempotencyGuard, ProcessingResult};

/// Wraps a bus handler so each event id is handled once per handler name.
///
/// Records are keyed `<handler>:<event_id>`, so two handlers in the same
/// service can consume the same event independently. A failed inner handler
/// surfaces as an error and the bus ack policy decides what happens next.
pub struct IdempotentHandler<H> {
    inner: H,
    guard: IdempotencyGuard,
}

impl<H: EventHandler> IdempotentHandler<H> {
    pub fn new(inner: H, guard: IdempotencyGuard) -> Self {
        Self { inner, guard }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn key_for(&self, message: &EventMessage) -> String {
        format!("{}:{}", self.inner.name(), message.event_id)
    }
}

#[async_trait]
impl<H: EventHandler> EventHandler for IdempotentHandler<H> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn handle(&self, message: &EventMessage) -> anyhow::Result<()> {
        let key = self.key_for(message);
        let metadata = json!({ "routing_key": message.routing_key() });

        let result = self
            .guard
            .process_if_new_with_metadata(&key, Some(metadata), || self.inner.handle(message))
            .await?;

        match result {
            ProcessingResult::Success | ProcessingResult::AlreadyProcessed => Ok(()),
            ProcessingResult::Failed(reason) => Err(anyhow::anyhow!(reason)),
        }
    }
}
