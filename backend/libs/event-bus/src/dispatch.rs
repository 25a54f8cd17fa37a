//! Consumer side: decode, invoke the handler, decide the ack

use crate::config::{dead_letter_key, AckPolicy};
use crate::handler::EventHandler;
use crate::metrics;
use crate::transport::{Delivery, Subscription, Transport};
use event_schema::EventMessage;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pause after a broker-side receive error
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// What happened to one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled { attempts: u32 },
    /// Acked without successful handling; the message is gone
    Dropped { attempts: u32, reason: String },
    /// Raw body republished under `dlq.<routing_key>` and acked
    DeadLettered { attempts: u32, reason: String },
    /// Dead-lettering failed, so the delivery is left unacked
    Unresolved { reason: String },
}

impl DispatchOutcome {
    pub fn should_ack(&self) -> bool {
        !matches!(self, DispatchOutcome::Unresolved { .. })
    }
}

/// Runs one subscription's handler under an ack policy
pub struct Dispatcher {
    handler: Arc<dyn EventHandler>,
    policy: AckPolicy,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn EventHandler>, policy: AckPolicy, transport: Arc<dyn Transport>) -> Self {
        Self {
            handler,
            policy,
            transport,
        }
    }

    pub async fn dispatch(&self, delivery: &Delivery) -> DispatchOutcome {
        let message = match EventMessage::decode(&delivery.routing_key, &delivery.body) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    handler = %self.handler.name(),
                    routing_key = %delivery.routing_key,
                    error = %e,
                    "Undecodable delivery"
                );
                return match self.policy {
                    AckPolicy::AckOnSuccess {
                        dead_letter: true, ..
                    } => self.dead_letter(delivery, 0, e.to_string()).await,
                    _ => DispatchOutcome::Dropped {
                        attempts: 0,
                        reason: e.to_string(),
                    },
                };
            }
        };

        match &self.policy {
            AckPolicy::AlwaysAck => match self.handler.handle(&message).await {
                Ok(()) => DispatchOutcome::Handled { attempts: 1 },
                Err(e) => {
                    metrics::record_handler_failure(self.handler.name());
                    error!(
                        handler = %self.handler.name(),
                        routing_key = %delivery.routing_key,
                        event_id = %message.event_id,
                        error = %format!("{:#}", e),
                        "Event handler failed, message acked and lost"
                    );
                    DispatchOutcome::Dropped {
                        attempts: 1,
                        reason: format!("{:#}", e),
                    }
                }
            },
            AckPolicy::AckOnSuccess {
                max_attempts,
                retry_delay,
                dead_letter,
            } => {
                let max_attempts = (*max_attempts).max(1);
                let mut attempt = 1;

                loop {
                    let err = match self.handler.handle(&message).await {
                        Ok(()) => return DispatchOutcome::Handled { attempts: attempt },
                        Err(e) => e,
                    };
                    metrics::record_handler_failure(self.handler.name());

                    if attempt >= max_attempts {
                        let reason = format!("{:#}", err);
                        if *dead_letter {
                            return self.dead_letter(delivery, attempt, reason).await;
                        }
                        error!(
                            handler = %self.handler.name(),
                            routing_key = %delivery.routing_key,
                            event_id = %message.event_id,
                            attempts = attempt,
                            error = %reason,
                            "Event handler gave up, message dropped"
                        );
                        return DispatchOutcome::Dropped {
                            attempts: attempt,
                            reason,
                        };
                    }

                    warn!(
                        handler = %self.handler.name(),
                        routing_key = %delivery.routing_key,
                        event_id = %message.event_id,
                        attempt,
                        max_attempts,
                        error = %format!("{:#}", err),
                        "Event handler failed, retrying"
                    );
                    tokio::time::sleep(*retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn dead_letter(&self, delivery: &Delivery, attempts: u32, reason: String) -> DispatchOutcome {
        let key = dead_letter_key(&delivery.routing_key);

        match self.transport.publish(&key, &delivery.body).await {
            Ok(()) => {
                metrics::record_dead_lettered(&delivery.routing_key);
                error!(
                    handler = %self.handler.name(),
                    routing_key = %delivery.routing_key,
                    dead_letter_key = %key,
                    attempts,
                    error = %reason,
                    "Delivery dead-lettered"
                );
                DispatchOutcome::DeadLettered { attempts, reason }
            }
            Err(e) => {
                error!(
                    handler = %self.handler.name(),
                    routing_key = %delivery.routing_key,
                    error = %e,
                    "Dead-letter publish failed, leaving delivery unacked"
                );
                DispatchOutcome::Unresolved {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Consume until the subscription closes. One delivery at a time.
pub(crate) async fn run_consumer(
    mut subscription: Box<dyn Subscription>,
    dispatcher: Dispatcher,
    binding: String,
) {
    let handler = dispatcher.handler.name().to_string();
    info!(binding = %binding, handler = %handler, "Event consumer started");

    loop {
        match subscription.next().await {
            Some(Ok(delivery)) => {
                let outcome = dispatcher.dispatch(&delivery).await;
                debug!(
                    handler = %handler,
                    routing_key = %delivery.routing_key,
                    outcome = ?outcome,
                    "Delivery dispatched"
                );
                if outcome.should_ack() {
                    if let Err(e) = subscription.ack(&delivery).await {
                        warn!(handler = %handler, error = %e, "Failed to ack delivery");
                    }
                }
            }
            Some(Err(e)) => {
                error!(handler = %handler, error = %e, "Event consumer receive error");
                tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
            }
            None => {
                info!(binding = %binding, handler = %handler, "Event consumer stopped");
                break;
            }
        }
    }
}
