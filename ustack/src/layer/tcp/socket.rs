//! The blocking application surface.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::layer::{Error, Result};
use crate::nic::Device;
use crate::time::Instant;
use crate::wire::Endpoint;

use super::connection::Connection;
use super::interface::Interface;
use super::state::State;

/// A connection and the condition its waiters block on.
///
/// Every segment, timer event and local operation locks `connection` and notifies `changed`
/// afterwards.
pub(crate) struct Shared {
    pub(crate) connection: Mutex<Connection>,
    pub(crate) changed: Condvar,
    /// The socket was dropped, release the address once closed.
    pub(crate) orphaned: AtomicBool,
}

/// A TCP socket bound to an interface.
///
/// All methods take `&self`, a socket can be shared between a reading and a writing thread.
/// Opening a connection, and receiving, blocks the calling thread until the connection made
/// progress. Dropping the socket closes the connection gracefully, it lingers in the interface
/// until fully closed.
pub struct Socket<D: Device> {
    shared: Arc<Shared>,
    interface: Arc<Interface<D>>,
}

impl<D: Device> Socket<D> {
    /// Create a closed, unbound socket.
    pub fn new(interface: &Arc<Interface<D>>) -> Self {
        let shared = Shared {
            connection: Mutex::new(interface.connection()),
            changed: Condvar::new(),
            orphaned: AtomicBool::new(false),
        };

        Socket {
            shared: Arc::new(shared),
            interface: interface.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.shared.connection.lock()
    }

    fn wait_while(&self, connection: &mut MutexGuard<'_, Connection>, pending: fn(State) -> bool) {
        while pending(connection.state()) {
            self.shared.changed.wait(connection);
        }
    }

    fn opened(connection: &Connection) -> Result<()> {
        if connection.is_synchronized() {
            Ok(())
        } else {
            Err(connection.error().unwrap_or(Error::Reset))
        }
    }

    /// Bind the socket to a local address.
    ///
    /// An unspecified address only makes sense for listening, it accepts segments to any local
    /// address. Fails with `AddrInUse` if another socket holds the address and `Illegal` if this
    /// one is already bound.
    pub fn bind(&self, local: Endpoint) -> Result<()> {
        let mut connection = self.lock();
        if connection.state() != State::Closed || connection.bound().port != 0 || local.port == 0 {
            return Err(Error::Illegal);
        }

        if !self.interface.bind(local, &self.shared) {
            return Err(Error::AddrInUse);
        }
        connection.bind(local)
    }

    /// Open a connection to a remote and wait for the handshake.
    ///
    /// Fails with the reason of the abort if the connection closed instead, `Reset` when the peer
    /// refused.
    pub fn connect(&self, remote: Endpoint) -> Result<()> {
        let mut connection = self.lock();
        connection.connect(remote, Instant::now(), &*self.interface)?;
        self.wait_while(&mut connection, |state| state == State::SynSent || state == State::SynReceived);
        Self::opened(&connection)
    }

    /// Wait for a peer to connect.
    ///
    /// The socket itself becomes the connection, there is no accept queue.
    pub fn listen(&self) -> Result<()> {
        let mut connection = self.lock();
        connection.listen()?;
        self.wait_while(&mut connection, |state| state == State::Listen || state == State::SynReceived);
        Self::opened(&connection)
    }

    /// Close the sending direction.
    ///
    /// Does not wait for the peer. Data can still be received until the peer closes as well.
    pub fn close(&self) -> Result<()> {
        let mut connection = self.lock();
        let result = connection.close(Instant::now(), &*self.interface);
        self.shared.changed.notify_all();
        result
    }

    /// Queue data for sending, returning the number of bytes queued.
    ///
    /// Never blocks. Fails with `Exhausted` if the send buffer can not take all of `data`.
    pub fn send(&self, data: &[u8]) -> Result<usize> {
        self.lock().send(data, Instant::now(), &*self.interface)
    }

    /// Wait for data and copy the next segments into `dest`.
    ///
    /// Returns `Ok(0)` at the end of the stream. Segments are never split, a buffer of at least
    /// the MSS never fails with `BadSize`.
    pub fn receive(&self, dest: &mut [u8]) -> Result<usize> {
        let mut connection = self.lock();
        loop {
            if let Some(len) = connection.receive(dest, &*self.interface)? {
                return Ok(len);
            }
            self.shared.changed.wait(&mut connection);
        }
    }

    /// The current state of the connection.
    pub fn state(&self) -> State {
        self.lock().state()
    }

    /// The local endpoint of the connection.
    pub fn local(&self) -> Endpoint {
        self.lock().tuple().local
    }

    /// The remote endpoint, unspecified until connected.
    pub fn remote(&self) -> Endpoint {
        self.lock().tuple().remote
    }

    /// Look at the connection under its lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&Connection) -> R) -> R {
        f(&self.lock())
    }

    /// The interface the socket lives on.
    pub fn interface(&self) -> &Arc<Interface<D>> {
        &self.interface
    }
}

impl<D: Device> Drop for Socket<D> {
    fn drop(&mut self) {
        let (closed, bound) = {
            let mut connection = self.lock();
            if let Err(err) = connection.close(Instant::now(), &*self.interface) {
                net_debug!("{}: close on drop: {}", connection.tuple(), err);
            }
            self.shared.changed.notify_all();
            (connection.state() == State::Closed, connection.bound())
        };

        self.shared.orphaned.store(true, Ordering::Release);
        if closed && bound.port != 0 {
            self.interface.unbind(bound, &self.shared);
        }
    }
}
