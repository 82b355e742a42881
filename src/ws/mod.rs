//! WebSocket ingest
//!
//! One connection carries one recording session. Each text frame is a JSON
//! object with an `action` (`start`, `data`, `end`, `heartbeat`); every frame
//! gets exactly one JSON reply, and errors never close the connection.

mod connection;
mod frame;
mod router;

pub use connection::handle_socket;
pub use frame::{Action, Command, OutboundFrame, RoutedFrame};
pub use router::FrameRouter;
