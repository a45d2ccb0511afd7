//! The process logic of protocol layers.
//!
//! The packet logic is contained in `wire`, the processing part lives here. There is only a
//! single layer, [`tcp`], since IP itself is handled by the operating system behind the raw
//! socket. Its state is open to inspection: the connection state, both buffers and the
//! retransmission timer can be observed on a [`tcp::Socket`] without affecting the protocol.
//!
//! [`tcp`]: tcp/index.html
//! [`tcp::Socket`]: tcp/struct.Socket.html
use core::fmt;

pub mod tcp;

/// The result type for operations on connections and devices.
pub type Result<T> = core::result::Result<T, Error>;

/// The error type for operations on connections and devices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// The operation was not permitted.
    ///
    /// Returned when the connection is not in a state that allows the operation, e.g. connecting
    /// a socket that is not closed or sending after the local side has closed.
    Illegal,

    /// The provided buffer can not hold the next segment.
    ///
    /// Received segments are never split on delivery, a larger buffer succeeds.
    BadSize,

    /// The device failed to transmit a segment.
    Unreachable,

    /// The action could not be completed because there were not enough resources.
    ///
    /// Returned when a buffer does not have the room for a write. It would have been legal with
    /// more resources, retrying after the peer acknowledged or the application read some data
    /// may succeed.
    Exhausted,

    /// The requested local address is already bound.
    AddrInUse,

    /// The connection was aborted.
    ///
    /// Either the peer sent a reset, a segment violated the protocol or the local side gave up.
    Reset,

    /// The peer stopped acknowledging and the retransmission limit was reached.
    TimedOut,
}

/// Can convert from a wire error.
///
/// This indicates some layer tried to operate on a packet but failed.
impl From<crate::wire::Error> for Error {
    fn from(_: crate::wire::Error) -> Self {
        Error::Illegal
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Illegal     => write!(f, "operation not permitted in this state"),
            Error::BadSize     => write!(f, "buffer too small"),
            Error::Unreachable => write!(f, "transmission failed"),
            Error::Exhausted   => write!(f, "buffer full"),
            Error::AddrInUse   => write!(f, "address already in use"),
            Error::Reset       => write!(f, "connection reset"),
            Error::TimedOut    => write!(f, "connection timed out"),
        }
    }
}

impl std::error::Error for Error {}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> std::io::Error {
        use std::io::ErrorKind;
        let kind = match err {
            Error::Illegal     => ErrorKind::NotConnected,
            Error::BadSize     => ErrorKind::InvalidInput,
            Error::Unreachable => ErrorKind::Other,
            Error::Exhausted   => ErrorKind::WouldBlock,
            Error::AddrInUse   => ErrorKind::AddrInUse,
            Error::Reset       => ErrorKind::ConnectionReset,
            Error::TimedOut    => ErrorKind::TimedOut,
        };
        std::io::Error::new(kind, err)
    }
}
