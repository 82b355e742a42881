pub mod chunk;
pub mod writer;

pub use chunk::decode_chunk;
pub use writer::{sync_to_disk, StreamWriter};
