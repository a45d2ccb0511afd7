//! Implementation of a software loop-back device.
use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::layer::{Error, Result};
use crate::time::Duration;
use crate::wire::{ipv4_packet, tcp_packet, IpProtocol, Ipv4Address, Ipv4Repr, TcpRepr};
use crate::wire::IPV4_HEADER_LEN;

use super::Device;

/// A predicate deciding which sent segments are delivered.
///
/// Returning `false` silently drops the segment, as a lossy link would.
pub type Filter = Box<dyn FnMut(&TcpRepr) -> bool + Send>;

/// A software loop-back device.
///
/// Every sent segment is framed into an IPv4 datagram and queued for receiving, so all
/// connections of one interface can talk to each other. A filter can drop segments to simulate
/// loss.
pub struct Loopback {
    queue: Mutex<VecDeque<Vec<u8>>>,
    arrived: Condvar,
    filter: Mutex<Option<Filter>>,
    hop_limit: u8,
}

impl Loopback {
    /// Create an empty loop-back device.
    pub fn new() -> Self {
        Loopback {
            queue: Mutex::new(VecDeque::new()),
            arrived: Condvar::new(),
            filter: Mutex::new(None),
            hop_limit: 64,
        }
    }

    /// Install a filter consulted for each sent segment.
    pub fn set_filter<F>(&self, filter: F)
        where F: FnMut(&TcpRepr) -> bool + Send + 'static
    {
        *self.filter.lock() = Some(Box::new(filter));
    }

    /// Deliver all segments again.
    pub fn clear_filter(&self) {
        *self.filter.lock() = None;
    }

    /// The number of datagrams waiting to be received.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    fn admitted(&self, segment: &[u8], src: Ipv4Address, dst: Ipv4Address) -> Result<bool> {
        let mut filter = self.filter.lock();
        let filter = match filter.as_mut() {
            Some(filter) => filter,
            None => return Ok(true),
        };

        let packet = tcp_packet::new_checked(segment)?;
        let repr = TcpRepr::parse(packet, src, dst)?;
        Ok(filter(&repr))
    }
}

impl Default for Loopback {
    fn default() -> Self {
        Loopback::new()
    }
}

impl Device for Loopback {
    fn send(&self, src: Ipv4Address, dst: Ipv4Address, segment: &[u8]) -> Result<usize> {
        if IPV4_HEADER_LEN + segment.len() > usize::from(u16::max_value()) {
            return Err(Error::BadSize);
        }

        if !self.admitted(segment, src, dst)? {
            net_trace!("loopback: dropped segment {} -> {}", src, dst);
            return Ok(segment.len());
        }

        let repr = Ipv4Repr {
            src_addr: src,
            dst_addr: dst,
            protocol: IpProtocol::Tcp,
            payload_len: segment.len(),
            hop_limit: self.hop_limit,
        };

        let mut datagram = vec![0; repr.buffer_len() + segment.len()];
        repr.emit(ipv4_packet::new_unchecked_mut(&mut datagram));
        datagram[repr.buffer_len()..].copy_from_slice(segment);

        self.queue.lock().push_back(datagram);
        self.arrived.notify_one();
        Ok(segment.len())
    }

    fn recv(&self, buffer: &mut [u8], timeout: Duration) -> Result<Option<usize>> {
        let mut queue = self.queue.lock();
        if queue.is_empty() {
            self.arrived.wait_for(&mut queue, timeout);
        }

        let datagram = match queue.pop_front() {
            Some(datagram) => datagram,
            None => return Ok(None),
        };

        // Truncated like a datagram socket would.
        let len = datagram.len().min(buffer.len());
        buffer[..len].copy_from_slice(&datagram[..len]);
        Ok(Some(len))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::wire::{TcpFlags, TcpSeqNumber};

    const A: Ipv4Address = Ipv4Address([10, 0, 0, 1]);
    const B: Ipv4Address = Ipv4Address([10, 0, 0, 2]);

    fn segment(flags: TcpFlags) -> Vec<u8> {
        let repr = TcpRepr {
            src_port: 1000,
            dst_port: 2000,
            flags,
            seq_number: TcpSeqNumber(7),
            ack_number: TcpSeqNumber(0),
            window_len: 64,
            payload_len: 0,
        };
        let mut bytes = vec![0; repr.buffer_len()];
        let packet = tcp_packet::new_unchecked_mut(&mut bytes);
        repr.emit(packet);
        packet.fill_checksum(A, B);
        bytes
    }

    #[test]
    fn delivers_framed_datagram() {
        let device = Loopback::new();
        let sent = segment(TcpFlags::SYN);
        assert_eq!(device.send(A, B, &sent), Ok(sent.len()));
        assert_eq!(device.pending(), 1);

        let mut buffer = [0; 128];
        let len = device.recv(&mut buffer, Duration::from_millis(0)).unwrap().unwrap();
        let packet = ipv4_packet::new_checked(&buffer[..len]).unwrap();
        let repr = Ipv4Repr::parse(packet).unwrap();
        assert_eq!(repr.src_addr, A);
        assert_eq!(repr.dst_addr, B);
        assert_eq!(repr.protocol, IpProtocol::Tcp);
        assert_eq!(packet.payload_slice(), &sent[..]);
    }

    #[test]
    fn empty_times_out() {
        let device = Loopback::new();
        let mut buffer = [0; 64];
        assert_eq!(device.recv(&mut buffer, Duration::from_millis(1)), Ok(None));
    }

    #[test]
    fn filter_drops() {
        let device = Loopback::new();
        device.set_filter(|repr| !repr.flags.syn());

        assert!(device.send(A, B, &segment(TcpFlags::SYN)).is_ok());
        assert_eq!(device.pending(), 0);
        assert!(device.send(A, B, &segment(TcpFlags::ACK)).is_ok());
        assert_eq!(device.pending(), 1);

        device.clear_filter();
        assert!(device.send(A, B, &segment(TcpFlags::SYN)).is_ok());
        assert_eq!(device.pending(), 2);
    }
}
