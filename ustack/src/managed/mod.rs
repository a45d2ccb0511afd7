//! Owning containers shaped for sequence space.
//!
//! Unlike the standard ordered collections these never compare keys as plain integers. Every
//! ordering decision goes through the wrapping comparison of [`TcpSeqNumber`].
//!
//! [`TcpSeqNumber`]: ../wire/struct.TcpSeqNumber.html
mod ordered;

pub use self::ordered::{Ordered, Sequenced};
