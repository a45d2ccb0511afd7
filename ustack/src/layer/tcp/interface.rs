//! The dispatch boundary between a device and the sockets bound on it.
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;

use crate::layer::Result;
use crate::nic::Device;
use crate::time::{Duration, Instant};
use crate::wire::{Endpoint, FourTuple, IpProtocol, Ipv4Address};
use crate::wire::{ipv4_packet, tcp_packet, Ipv4Repr, TcpRepr};

use super::config::Config;
use super::connection::{Connection, Outgoing, Transmit};
use super::siphash::IsnGenerator;
use super::socket::Shared;
use super::state::State;

/// Largest datagram read from the device.
const MAX_DATAGRAM: usize = 1 << 16;

/// Demultiplexes datagrams of a device onto the bound sockets.
///
/// The interface is shared by all of its sockets, usually behind an `Arc`. It is the transmit
/// capability handed to every connection and is driven by the two threads of [`spawn`], or
/// manually with [`poll`] and [`poll_timers`].
///
/// [`spawn`]: #method.spawn
/// [`poll`]: #method.poll
/// [`poll_timers`]: #method.poll_timers
pub struct Interface<D> {
    device: D,
    config: Config,
    isn: IsnGenerator,
    bound: Mutex<HashMap<Endpoint, Arc<Shared>>>,
    rx: Mutex<Vec<u8>>,
}

impl<D: Device> Interface<D> {
    /// Create an interface on a device, with ISNs keyed from the std random state.
    pub fn new(device: D, config: Config) -> Self {
        Interface::with_isn(device, config, IsnGenerator::from_std_hash())
    }

    /// Create an interface with a chosen ISN generator.
    pub fn with_isn(device: D, config: Config, isn: IsnGenerator) -> Self {
        Interface {
            device,
            config: config.clamped(),
            isn,
            bound: Mutex::new(HashMap::new()),
            rx: Mutex::new(vec![0; MAX_DATAGRAM]),
        }
    }

    /// The configuration of new connections.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The number of bound sockets, including closing ones whose socket was dropped.
    pub fn bound_count(&self) -> usize {
        self.bound.lock().len()
    }

    pub(crate) fn connection(&self) -> Connection {
        Connection::new(self.config, self.isn)
    }

    /// Register a socket for an address.
    ///
    /// Returns `false` if the address is taken.
    pub(crate) fn bind(&self, local: Endpoint, socket: &Arc<Shared>) -> bool {
        let mut bound = self.bound.lock();
        if bound.contains_key(&local) {
            return false;
        }
        bound.insert(local, socket.clone());
        true
    }

    pub(crate) fn unbind(&self, local: Endpoint, socket: &Arc<Shared>) {
        let mut bound = self.bound.lock();
        let owned = bound.get(&local)
            .map_or(false, |entry| Arc::ptr_eq(entry, socket));
        if owned {
            bound.remove(&local);
        }
    }

    fn lookup(&self, local: Endpoint) -> Option<Arc<Shared>> {
        let bound = self.bound.lock();
        bound.get(&local)
            .or_else(|| bound.get(&Endpoint::new(Ipv4Address::UNSPECIFIED, local.port)))
            .cloned()
    }

    /// Receive and dispatch at most one datagram.
    ///
    /// Returns `Ok(false)` if nothing arrived within `timeout`.
    pub fn poll(&self, timeout: Duration) -> Result<bool> {
        let mut buffer = self.rx.lock();
        match self.device.recv(&mut buffer, timeout)? {
            Some(len) => {
                self.dispatch(&buffer[..len], Instant::now());
                Ok(true)
            },
            None => Ok(false),
        }
    }

    /// Hand one IPv4 datagram to the connection it is addressed to.
    ///
    /// Returns whether a connection consumed the segment. Malformed datagrams, other protocols
    /// and segments for unbound addresses are dropped.
    pub fn dispatch(&self, datagram: &[u8], now: Instant) -> bool {
        let packet = match ipv4_packet::new_checked(datagram) {
            Ok(packet) => packet,
            Err(err) => {
                net_debug!("dropping datagram: {}", err);
                return false;
            },
        };
        let ip = match Ipv4Repr::parse(packet) {
            Ok(repr) => repr,
            Err(err) => {
                net_debug!("dropping datagram: {}", err);
                return false;
            },
        };
        if ip.protocol != IpProtocol::Tcp {
            return false;
        }

        let segment = match tcp_packet::new_checked(packet.payload_slice()) {
            Ok(segment) => segment,
            Err(err) => {
                net_debug!("{}: dropping segment: {}", ip, err);
                return false;
            },
        };
        let repr = match TcpRepr::parse(segment, ip.src_addr, ip.dst_addr) {
            Ok(repr) => repr,
            Err(err) => {
                net_debug!("{}: dropping segment: {}", ip, err);
                return false;
            },
        };

        let tuple = FourTuple {
            local: Endpoint::new(ip.dst_addr, repr.dst_port),
            remote: Endpoint::new(ip.src_addr, repr.src_port),
        };

        let socket = match self.lookup(tuple.local) {
            Some(socket) => socket,
            None => {
                net_trace!("{}: nothing bound", tuple);
                return false;
            },
        };

        let mut connection = socket.connection.lock();
        connection.arrives(&repr, tuple, segment.payload_slice(), now, self);
        drop(connection);
        socket.changed.notify_all();
        true
    }

    /// Advance the timers of all connections.
    ///
    /// Retransmits, ends TIME-WAIT and forgets connections whose socket is gone once they are
    /// closed. Returns the number of connections whose state changed.
    pub fn poll_timers(&self, now: Instant) -> usize {
        let sockets: Vec<_> = self.bound.lock()
            .iter()
            .map(|(local, socket)| (*local, socket.clone()))
            .collect();

        let mut changed = 0;
        let mut reap = Vec::new();
        for (local, socket) in sockets {
            let mut connection = socket.connection.lock();
            if connection.poll(now, self) {
                changed += 1;
                socket.changed.notify_all();
            }
            let closed = connection.state() == State::Closed;
            drop(connection);

            if closed && socket.orphaned.load(Ordering::Acquire) {
                reap.push((local, socket));
            }
        }

        for (local, socket) in reap {
            net_trace!("{}: released", local);
            self.unbind(local, &socket);
        }

        changed
    }
}

impl<D: Device> Transmit for Interface<D> {
    fn transmit(&self, outgoing: &Outgoing) -> Result<usize> {
        let repr = outgoing.repr();
        let mut buffer = vec![0; repr.buffer_len()];

        let segment = tcp_packet::new_unchecked_mut(&mut buffer);
        repr.emit(segment);
        segment.payload_mut_slice().copy_from_slice(outgoing.payload);
        segment.fill_checksum(outgoing.tuple.local.addr, outgoing.tuple.remote.addr);

        net_trace!("{}: send {}", outgoing.tuple, repr);
        self.device.send(outgoing.tuple.local.addr, outgoing.tuple.remote.addr, &buffer)
    }
}
