//! A user-space TCP running directly on raw IPv4 sockets.
//!
//! ## Table of contents
//!
//! 1. [Design](#design)
//! 2. [The wire module](wire/index.html)
//! 3. [The protocol engine](layer/tcp/index.html)
//! 4. [Network interfaces](nic/index.html)
//! 5. Internals
//!    1. [The managed module](managed/index.html)
//!    2. [The storage module](storage/index.html)
//!
//! ## Design
//!
//! The kernel still owns IP but every byte of TCP is handled here: sequencing, retransmission,
//! flow and congestion control, reassembly and the connection state machine. Segments are read
//! from and written to a raw `IPPROTO_TCP` socket (or any other [`nic::Device`]).
//!
//! The protocol engines themselves never block and never look at a clock. Each connection is a
//! plain state machine that is handed the current [`time::Instant`] and a transmit capability
//! whenever it is driven. Blocking happens only at the [`layer::tcp::Socket`] surface, where the
//! application waits on a per-connection condition until the state machine makes progress.
//!
//! Two background threads drive all sockets of an [`layer::tcp::Interface`]: one receives and
//! demultiplexes datagrams, one ticks the retransmission and TIME-WAIT timers.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ustack::layer::tcp::{Config, Interface, Socket};
//! use ustack::nic::RawSocket;
//! use ustack::wire::Endpoint;
//!
//! let device = RawSocket::new().unwrap();
//! let interface = Arc::new(Interface::new(device, Config::default()));
//! let _service = interface.clone().spawn().unwrap();
//!
//! let socket = Socket::new(&interface);
//! socket.bind("127.0.0.1:40000".parse::<Endpoint>().unwrap()).unwrap();
//! socket.connect("127.0.0.1:40001".parse::<Endpoint>().unwrap()).unwrap();
//! socket.send(b"hello\n").unwrap();
//! ```
#![warn(missing_docs)]
#![warn(unreachable_pub)]

#[macro_use] mod macros;

pub mod layer;
pub mod managed;
pub mod nic;
pub mod storage;
pub mod time;
pub mod wire;
