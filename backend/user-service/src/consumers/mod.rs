/// Event consumers for user-service
pub mod post_counter;

pub use post_counter::PostCounterConsumer;

pub const POST_COUNTER_BINDINGS: [&str; 2] = [
    event_schema::routing_keys::POST_CREATED,
    event_schema::routing_keys::POST_DELETED,
];
