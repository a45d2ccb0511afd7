// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD
use core::mem;
use std::os::unix::io::{RawFd, AsRawFd};

use libc;
use parking_lot::Mutex;
use super::{wait, Errno, FdResult, LibcResult, IoLenResult};

use crate::layer::{Error, Result};
use crate::nic::Device;
use crate::time::Duration;
use crate::wire::Ipv4Address;

/// A raw `IPPROTO_TCP` socket, usable as a device.
///
/// The kernel prepends the IPv4 header on sending, choosing the source address by its routing
/// table. Segment checksums are computed over the source the connection was bound to, so bind
/// to the address of the outgoing interface. Reads return every inbound TCP datagram of the
/// host including its IPv4 header, the interface filters by destination.
///
/// Opening the socket requires `CAP_NET_RAW`. Note that the kernel's own TCP also sees these
/// segments and answers those for ports it does not know with a reset, a firewall rule that
/// drops outgoing resets of the used ports avoids this.
///
/// Uses the errno principle for storing the last underlying error on a failed operation.
#[derive(Debug)]
pub struct RawSocket {
    lower: libc::c_int,
    last_err: Mutex<Option<Errno>>,
}

impl RawSocket {
    /// Open a raw TCP socket.
    pub fn new() -> core::result::Result<Self, Errno> {
        let lower = unsafe {
            libc::socket(libc::AF_INET, libc::SOCK_RAW, libc::IPPROTO_TCP)
        };

        FdResult(lower).errno()?;

        Ok(RawSocket {
            lower,
            last_err: Mutex::new(None),
        })
    }

    /// Take the last io error returned by the OS.
    pub fn last_err(&self) -> Option<Errno> {
        self.last_err.lock().take()
    }

    /// Receive a single datagram into the buffer.
    pub fn recv_raw(&self, buffer: &mut [u8]) -> core::result::Result<usize, Errno> {
        let len = unsafe {
            libc::recv(
                self.lower,
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
                0)
        };
        IoLenResult(len).errno()?;
        Ok(len as usize)
    }

    /// Send a single TCP segment to an address.
    pub fn send_raw(&self, dst: Ipv4Address, segment: &[u8]) -> core::result::Result<usize, Errno> {
        let sockaddr = libc::sockaddr_in {
            sin_family: libc::AF_INET as libc::sa_family_t,
            sin_port: 0,
            sin_addr: libc::in_addr { s_addr: u32::from_ne_bytes(dst.0) },
            sin_zero: [0; 8],
        };

        let len = unsafe {
            libc::sendto(
                self.lower,
                segment.as_ptr() as *const libc::c_void,
                segment.len(),
                0,
                &sockaddr as *const libc::sockaddr_in as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t)
        };
        IoLenResult(len).errno()?;
        Ok(len as usize)
    }

    fn store_err(&self, err: Errno) -> Error {
        net_warn!("raw socket: {}", err);
        *self.last_err.lock() = Some(err);
        Error::Unreachable
    }
}

impl AsRawFd for RawSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.lower
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.lower); }
    }
}

impl Device for RawSocket {
    fn send(&self, _: Ipv4Address, dst: Ipv4Address, segment: &[u8]) -> Result<usize> {
        self.send_raw(dst, segment)
            .map_err(|err| self.store_err(err))
    }

    fn recv(&self, buffer: &mut [u8], timeout: Duration) -> Result<Option<usize>> {
        match wait(self.lower, Some(timeout)) {
            Ok(true) => (),
            Ok(false) => return Ok(None),
            Err(Errno(libc::EINTR)) => return Ok(None),
            Err(err) => return Err(self.store_err(err)),
        }

        match self.recv_raw(buffer) {
            Ok(len) => Ok(Some(len)),
            Err(Errno(libc::EINTR)) | Err(Errno(libc::EAGAIN)) => Ok(None),
            Err(err) => Err(self.store_err(err)),
        }
    }
}
