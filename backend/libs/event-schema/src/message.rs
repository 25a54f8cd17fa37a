use crate::error::SchemaError;
use crate::events::DomainEvent;
use serde_json::Value;
use uuid::Uuid;

/// Body field carrying the deduplication key
const EVENT_ID_FIELD: &str = "event_id";

/// A domain event together with its delivery identity.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMessage {
    pub event_id: Uuid,
    pub event: DomainEvent,
}

impl EventMessage {
    pub fn new(event: DomainEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event,
        }
    }

    pub fn with_id(event_id: Uuid, event: DomainEvent) -> Self {
        Self { event_id, event }
    }

    pub fn routing_key(&self) -> &'static str {
        self.event.routing_key()
    }

    /// Payload object of the event with `event_id` added.
    pub fn to_value(&self) -> Result<Value, SchemaError> {
        let mut value = self.event.to_value()?;
        match value.as_object_mut() {
            Some(map) => {
                map.insert(
                    EVENT_ID_FIELD.to_string(),
                    Value::String(self.event_id.to_string()),
                );
                Ok(value)
            }
            None => Err(SchemaError::NotAnObject(self.routing_key().to_string())),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, SchemaError> {
        Ok(serde_json::to_vec(&self.to_value()?)?)
    }

    /// Decode a broker body delivered under `routing_key`.
    ///
    /// Bodies published without an `event_id` get a deterministic one derived
    /// from the routing key and the raw bytes, so redeliveries of the same
    /// body still deduplicate.
    pub fn decode(routing_key: &str, body: &[u8]) -> Result<Self, SchemaError> {
        let malformed = |source| SchemaError::MalformedPayload {
            routing_key: routing_key.to_string(),
            source,
        };

        let mut value: Value = serde_json::from_slice(body).map_err(malformed)?;
        let map = value
            .as_object_mut()
            .ok_or_else(|| SchemaError::NotAnObject(routing_key.to_string()))?;

        let event_id = map
            .remove(EVENT_ID_FIELD)
            .and_then(|v| v.as_str().and_then(|s| Uuid::parse_str(s).ok()))
            .unwrap_or_else(|| derived_event_id(routing_key, body));

        let event = DomainEvent::from_value(routing_key, value)
            .map_err(malformed)?
            .ok_or_else(|| SchemaError::UnknownRoutingKey(routing_key.to_string()))?;

        Ok(Self { event_id, event })
    }
}

fn derived_event_id(routing_key: &str, body: &[u8]) -> Uuid {
    let mut name = Vec::with_capacity(routing_key.len() + 1 + body.len());
    name.extend_from_slice(routing_key.as_bytes());
    name.push(b'\n');
    name.extend_from_slice(body);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, &name)
}
