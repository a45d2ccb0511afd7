/*! Low-level packet access and construction.

The `wire` module deals with the packet *representation*. It provides two levels of
functionality.

 * First, it provides functions to extract fields from sequences of octets, and to insert fields
   into sequences of octets. This happens in the lowercase structures [`ipv4_packet`] and
   [`tcp_packet`].
 * Second, it provides a compact, high-level representation of header data that can be created
   from parsing and emitted into a sequence of octets. This happens through the `Repr` structs,
   [`Ipv4Repr`] and [`TcpRepr`].

[`ipv4_packet`]: struct.ipv4_packet.html
[`tcp_packet`]: struct.tcp_packet.html
[`Ipv4Repr`]: struct.Ipv4Repr.html
[`TcpRepr`]: struct.TcpRepr.html

The packet structures guarantee that, if `check_len()` returned `Ok(())`, then no field accessor
or setter method will panic. When parsing untrusted input, it is *necessary* to use the checked
constructors or the `Repr::parse` methods which perform the same checks.

Sequence numbers of TCP live here as well. They compare by the sign of the wrapping difference,
the one rule all of the protocol engine relies on.
*/
mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
}

mod endpoint;
mod error;
pub(crate) mod ip;
mod ipv4;
mod tcp;

pub use self::endpoint::{Endpoint, FourTuple};

pub use self::error::{Error, Result};

pub use self::ip::Protocol as IpProtocol;

pub use self::ipv4::{
    Address as Ipv4Address,
    ipv4 as ipv4_packet,
    Repr as Ipv4Repr,
    HEADER_LEN as IPV4_HEADER_LEN,
};

pub use self::tcp::{
    Flags as TcpFlags,
    SeqNumber as TcpSeqNumber,
    tcp_packet,
    Repr as TcpRepr,
    HEADER_LEN as TCP_HEADER_LEN,
};
