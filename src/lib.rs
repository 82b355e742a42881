pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod nats;
pub mod reaper;
pub mod session;
pub mod ws;

pub use audio::{decode_chunk, StreamWriter};
pub use config::Config;
pub use error::{DecodeError, SessionError};
pub use http::{create_router, AppState};
pub use nats::{
    CompletionEmitter, CompletionWorker, DeliveryOutcome, EventSink, NatsClient,
    RecordCompletedEvent,
};
pub use reaper::Reaper;
pub use session::{CompletionRecord, SessionRegistry, SessionState, SessionStats};
pub use ws::{FrameRouter, OutboundFrame};
