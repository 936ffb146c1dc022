mod ring_bytes;
pub mod serde_ms;

pub use ring_bytes::RingBytes;
