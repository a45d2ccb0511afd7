//! Byte storage backing the connection buffers.
//!
//! Each direction of each connection owns exactly one [`RingStore`]. It holds payload only, all
//! bookkeeping of which bytes belong to which segment is done by the owning engine.
//!
//! [`RingStore`]: struct.RingStore.html
mod ring;

pub use self::ring::RingStore;
