//! The TCP layer.
//!
//! Offers connection oriented, reliable byte streams on top of an IPv4 device. Every part of the
//! protocol engine is a plain data structure that is driven by method calls, receives the current
//! time from its caller and never blocks:
//!
//! * [`SendBuffer`] owns all bytes not yet acknowledged by the peer. It splits them into
//!   segments, admits segments to the network within the congestion and the peer window, retires
//!   them on acknowledgment and retransmits the earliest one on timeout.
//! * [`RecvBuffer`] reassembles arriving segments in sequence order, trims overlap, cascades the
//!   acknowledgment over contiguous data and delivers whole segments to the application.
//! * [`Connection`] is the state machine of RFC 793 on top of both buffers.
//!
//! Unlike standard stacks where state and user live in different protection domains, it poses
//! no problem to inspect the internal state. The buffers, the timer and the estimators are all
//! available through [`Socket::inspect`].
//!
//! ## Threads
//!
//! The [`Interface`] maps local addresses to sockets. It is the only component that touches the
//! device: inbound datagrams are parsed and handed to the connection they address, outbound
//! segments of every connection pass through it as the [`Transmit`] capability. Each connection
//! sits behind its own mutex, the receive thread, the timer thread and application threads
//! serialize on it and nothing else. After every change the connection's condition variable is
//! notified and the blocking calls of [`Socket`] re-check their predicate.
//!
//! ## Sequence numbers
//!
//! Sequence numbers wrap around and compare by the sign of their difference, see
//! [`TcpSeqNumber`]. All queues of segments are ordered by that comparison, never by the raw
//! integer value.
//!
//! [`SendBuffer`]: struct.SendBuffer.html
//! [`RecvBuffer`]: struct.RecvBuffer.html
//! [`Connection`]: struct.Connection.html
//! [`Socket::inspect`]: struct.Socket.html#method.inspect
//! [`Interface`]: struct.Interface.html
//! [`Transmit`]: trait.Transmit.html
//! [`Socket`]: struct.Socket.html
//! [`TcpSeqNumber`]: ../../wire/struct.TcpSeqNumber.html
mod config;
mod congestion;
mod connection;
mod interface;
mod recv;
mod rtt;
mod segment;
mod send;
mod siphash;
mod socket;
mod state;
mod timer;


pub use self::config::Config;
pub use self::congestion::Congestion;
pub use self::connection::{Connection, Outgoing, Transmit};
pub use self::interface::Interface;
pub use self::recv::RecvBuffer;
pub use self::rtt::RttEstimator;
pub use self::segment::Segment;
pub use self::send::{Emit, SendBuffer};
pub use self::siphash::IsnGenerator;
pub use self::socket::Socket;
pub use self::state::State;
pub use self::timer::Service;
