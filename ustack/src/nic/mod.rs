//! Packet I/O below the protocol layer.
//!
//! A [`Device`] moves whole IPv4 datagrams carrying TCP. Sending takes a finished TCP segment
//! and its addresses, the device supplies the IP framing. Receiving yields complete datagrams,
//! header included, which the interface parses itself.
//!
//! [`Device`]: trait.Device.html
use crate::layer::Result;
use crate::time::Duration;
use crate::wire::Ipv4Address;

mod loopback;
#[cfg(target_os = "linux")]
pub mod sys;

pub use self::loopback::{Filter, Loopback};

#[cfg(target_os = "linux")]
pub use self::sys::RawSocket;

/// A raw IPv4 datagram device for TCP.
///
/// Both methods take `&self`: the receiving thread blocks in `recv` while connections transmit
/// from other threads.
pub trait Device {
    /// Send a TCP segment from `src` to `dst`.
    ///
    /// Returns the number of bytes of the segment that were sent.
    fn send(&self, src: Ipv4Address, dst: Ipv4Address, segment: &[u8]) -> Result<usize>;

    /// Receive one IPv4 datagram, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    fn recv(&self, buffer: &mut [u8], timeout: Duration) -> Result<Option<usize>>;
}

impl<D: Device + ?Sized> Device for &'_ D {
    fn send(&self, src: Ipv4Address, dst: Ipv4Address, segment: &[u8]) -> Result<usize> {
        (**self).send(src, dst, segment)
    }

    fn recv(&self, buffer: &mut [u8], timeout: Duration) -> Result<Option<usize>> {
        (**self).recv(buffer, timeout)
    }
}
