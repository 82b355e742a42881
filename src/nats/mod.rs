pub mod client;
pub mod emitter;
pub mod messages;

pub use client::NatsClient;
pub use emitter::{
    CompletionEmitter, CompletionWorker, DeliveryOutcome, DeliveryTally, EventSink,
};
pub use messages::RecordCompletedEvent;
