//! The receive side: reassembly of inbound segments into the byte stream.
use crate::layer::Result;
use crate::managed::Ordered;
use crate::storage::RingStore;
use crate::wire::{TcpFlags as Flags, TcpSeqNumber as SeqNumber};

use super::segment::Segment;

/// Reassembles inbound segments and tracks the acknowledgment cursor.
///
/// Segments are kept by starting sequence number, with pairwise disjoint ranges. Those below the
/// cursor have been acknowledged and wait for the application, those above arrived out of order
/// and wait for the gap before them to fill. The control markers SYN and FIN are consumed when the
/// cursor passes over them so that acknowledged entries only ever hold payload.
#[derive(Debug)]
pub struct RecvBuffer {
    store: RingStore,
    /// The next sequence number expected in order.
    ack: SeqNumber,
    /// Sequence number of the byte at the head of the store.
    read: SeqNumber,
    segments: Ordered<Segment>,
    /// The sequence number of the peer's FIN once it was passed by the cursor.
    fin: Option<SeqNumber>,
}

/// The part of an inbound segment still to be admitted.
#[derive(Clone, Copy, Debug)]
struct Pending<'a> {
    seq: SeqNumber,
    flags: Flags,
    data: &'a [u8],
}

impl RecvBuffer {
    /// A buffer with a store of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        RecvBuffer {
            store: RingStore::new(capacity),
            ack: SeqNumber::default(),
            read: SeqNumber::default(),
            segments: Ordered::new(),
            fin: None,
        }
    }

    /// Restart the stream at the peer's initial sequence number.
    ///
    /// The cursor points at the SYN itself which the caller is expected to admit next, payload
    /// starts one after it.
    pub fn set_initial_sequence(&mut self, irs: SeqNumber) {
        self.store.reset();
        self.segments.clear();
        self.ack = irs;
        self.read = irs + 1;
        self.fin = None;
    }

    /// Admit a segment into the buffer.
    ///
    /// Parts that were already received or lie beyond the window are cut off, as are parts that
    /// overlap a segment that is already held. Returns the number of payload bytes the call
    /// accounts for: the full length if everything was admitted or already present, less if the
    /// window ended within the payload.
    pub fn admit(&mut self, payload: &[u8], seq: SeqNumber, flags: Flags) -> Result<usize> {
        let requested = payload.len();
        let flags = flags & (Flags::SYN | Flags::FIN);
        let mut pending = Pending { seq, flags, data: payload };

        pending.trim_front(self.ack);
        let edge = self.read + self.store.capacity();
        let beyond = pending.trim_back(edge);

        for entry in self.segments.iter() {
            if entry.end() <= pending.seq {
                continue;
            }
            if entry.seq <= pending.seq && pending.end() <= entry.end() {
                pending.clear();
                break;
            }
            if entry.seq <= pending.seq {
                pending.trim_front(entry.end());
                continue;
            }
            if entry.seq < pending.end() {
                pending.trim_back(entry.seq);
            }
            break;
        }

        if !pending.is_empty() {
            let offset = self.store.head().wrapping_add(pending.data_seq() - self.read);
            self.store.write(offset, pending.data)?;
            net_trace!("recv admit seq={} len={} [{}]",
                pending.seq, pending.data.len(), pending.flags);
            self.segments.insert(Segment::new(pending.seq, pending.data.len(), pending.flags, offset));
            self.cascade();
        }

        Ok(requested - beyond)
    }

    /// Advance the cursor over every segment that now follows without a gap.
    fn cascade(&mut self) {
        while let Some(idx) = self.segments.find(self.ack) {
            let mut segment = match self.segments.remove(idx) {
                Some(segment) => segment,
                None => break,
            };

            self.ack = segment.end();
            if segment.flags.fin() {
                self.fin = Some(segment.end() - 1);
            }
            if segment.flags.syn() {
                segment.seq += 1;
            }
            segment.flags = segment.flags.without(Flags::SYN | Flags::FIN);

            if segment.len > 0 {
                self.segments.insert(segment);
            }
        }
    }

    /// Whether acknowledged payload waits for the application.
    pub fn deliverable(&self) -> bool {
        self.next_len().is_some()
    }

    /// Length of the next deliverable segment.
    pub fn next_len(&self) -> Option<usize> {
        self.segments.first()
            .filter(|segment| segment.seq < self.ack)
            .map(|segment| segment.len)
    }

    /// Copy whole deliverable segments into `dest`.
    ///
    /// Stops at the first segment that does not fit the remaining space, segments are never split.
    pub fn drain(&mut self, dest: &mut [u8]) -> usize {
        let mut copied = 0;
        while let Some(&segment) = self.segments.first() {
            if !(segment.seq < self.ack) || segment.len > dest.len() - copied {
                break;
            }

            let read = self.store.read(segment.offset, &mut dest[copied..copied + segment.len]);
            debug_assert_eq!(read, segment.len);
            copied += segment.len;

            self.segments.pop_first();
            self.read = segment.seq + segment.len;
            self.store.release(segment.offset.wrapping_add(segment.len));
        }
        copied
    }

    /// The acknowledgment number for outgoing segments.
    pub fn ack_number(&self) -> SeqNumber {
        self.ack
    }

    /// The receive window to advertise.
    ///
    /// Measured from the cursor to the end of the space the store can still take.
    pub fn window_size(&self) -> usize {
        let used = self.ack.diff(self.read).max(0) as usize;
        self.store.capacity().saturating_sub(used)
    }

    /// Check whether a segment overlaps the receive window.
    ///
    /// Either end of the segment in the window suffices. An empty segment must start in the window,
    /// or exactly at the cursor if the window is closed.
    pub fn accepts(&self, seq: SeqNumber, sequence_len: usize) -> bool {
        let window = self.window_size();
        let inside = |at: SeqNumber| self.ack <= at && at < self.ack + window;

        match (sequence_len, window) {
            (0, 0) => seq == self.ack,
            (0, _) => inside(seq),
            (_, 0) => false,
            (len, _) => inside(seq) || inside(seq + (len - 1)),
        }
    }

    /// Whether a segment lies completely before the cursor.
    pub fn is_duplicate(&self, seq: SeqNumber, sequence_len: usize) -> bool {
        sequence_len > 0 && seq + sequence_len <= self.ack
    }

    /// Whether the FIN of the peer has been reached in order.
    pub fn fin_received(&self) -> bool {
        self.fin.is_some()
    }

    /// The end of the stream was reached and everything before it was delivered.
    pub fn is_finished(&self) -> bool {
        self.fin_received() && !self.deliverable()
    }

    /// Number of segments held, in order or not.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Iterate over the held segments in sequence order.
    pub fn segments(&self) -> impl Iterator<Item=&Segment> + '_ {
        self.segments.iter()
    }
}

impl<'a> Pending<'a> {
    fn sequence_len(&self) -> usize {
        self.data.len() + self.flags.sequence_len()
    }

    fn end(&self) -> SeqNumber {
        self.seq + self.sequence_len()
    }

    fn data_seq(&self) -> SeqNumber {
        if self.flags.syn() { self.seq + 1 } else { self.seq }
    }

    fn is_empty(&self) -> bool {
        self.sequence_len() == 0
    }

    fn clear(&mut self) {
        self.flags = Flags::NONE;
        self.data = &[];
    }

    /// Cut everything before `to`.
    fn trim_front(&mut self, to: SeqNumber) {
        if to <= self.seq {
            return;
        }

        let mut cut = (to - self.seq).min(self.sequence_len());
        if cut > 0 && self.flags.syn() {
            self.flags = self.flags.without(Flags::SYN);
            self.seq += 1;
            cut -= 1;
        }
        let data = cut.min(self.data.len());
        self.data = &self.data[data..];
        self.seq += data;
        cut -= data;
        if cut > 0 && self.flags.fin() {
            self.flags = self.flags.without(Flags::FIN);
            self.seq += 1;
        }
    }

    /// Cut everything from `to` on, returning the number of payload bytes removed.
    fn trim_back(&mut self, to: SeqNumber) -> usize {
        let end = self.end();
        if end <= to {
            return 0;
        }

        let mut cut = (end - to.max(self.seq)).min(self.sequence_len());
        if cut > 0 && self.flags.fin() {
            self.flags = self.flags.without(Flags::FIN);
            cut -= 1;
        }
        let data = cut.min(self.data.len());
        self.data = &self.data[..self.data.len() - data];
        cut -= data;
        if cut > 0 && self.flags.syn() {
            self.flags = self.flags.without(Flags::SYN);
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IRS: SeqNumber = SeqNumber(1000);

    fn synchronized(capacity: usize) -> RecvBuffer {
        let mut recv = RecvBuffer::new(capacity);
        recv.set_initial_sequence(IRS);
        assert_eq!(recv.admit(&[], IRS, Flags::SYN), Ok(0));
        recv
    }

    fn bytes(range: core::ops::Range<u8>) -> Vec<u8> {
        range.collect()
    }

    fn drain_all(recv: &mut RecvBuffer) -> Vec<u8> {
        let mut buf = vec![0; 1 << 16];
        let len = recv.drain(&mut buf);
        buf.truncate(len);
        buf
    }

    #[test]
    fn syn_is_not_delivered() {
        let recv = synchronized(64);
        assert_eq!(recv.ack_number(), IRS + 1);
        assert!(!recv.deliverable());
        assert_eq!(recv.segment_count(), 0);
        assert_eq!(recv.window_size(), 64);
    }

    #[test]
    fn syn_with_payload() {
        let mut recv = RecvBuffer::new(64);
        recv.set_initial_sequence(IRS);
        assert_eq!(recv.admit(b"abc", IRS, Flags::SYN), Ok(3));
        assert_eq!(recv.ack_number(), IRS + 4);
        assert_eq!(recv.next_len(), Some(3));
        assert_eq!(drain_all(&mut recv), b"abc");
    }

    #[test]
    fn in_order() {
        let mut recv = synchronized(64);
        assert_eq!(recv.admit(b"hello", IRS + 1, Flags::PSH | Flags::ACK), Ok(5));
        assert_eq!(recv.ack_number(), IRS + 6);
        assert_eq!(recv.window_size(), 59);
        assert!(recv.deliverable());
        assert_eq!(drain_all(&mut recv), b"hello");
        assert_eq!(recv.window_size(), 64);
        assert!(!recv.deliverable());
    }

    #[test]
    fn out_of_order_cascades() {
        let mut recv = synchronized(64);
        assert_eq!(recv.admit(b"world", IRS + 6, Flags::NONE), Ok(5));
        assert_eq!(recv.ack_number(), IRS + 1);
        assert!(!recv.deliverable());

        assert_eq!(recv.admit(b"hello", IRS + 1, Flags::NONE), Ok(5));
        assert_eq!(recv.ack_number(), IRS + 11);
        assert_eq!(drain_all(&mut recv), b"helloworld");
    }

    #[test]
    fn duplicate_is_idempotent() {
        let mut once = synchronized(64);
        let mut twice = synchronized(64);
        once.admit(b"abcd", IRS + 1, Flags::NONE).unwrap();
        twice.admit(b"abcd", IRS + 1, Flags::NONE).unwrap();
        assert_eq!(twice.admit(b"abcd", IRS + 1, Flags::NONE), Ok(4));
        assert_eq!(once.ack_number(), twice.ack_number());
        assert_eq!(drain_all(&mut twice), b"abcd");
    }

    #[test]
    fn duplicate_out_of_order_is_idempotent() {
        let mut recv = synchronized(64);
        assert_eq!(recv.admit(b"efgh", IRS + 5, Flags::NONE), Ok(4));
        assert_eq!(recv.admit(b"efgh", IRS + 5, Flags::NONE), Ok(4));
        assert_eq!(recv.segment_count(), 1);
        recv.admit(b"abcd", IRS + 1, Flags::NONE).unwrap();
        assert_eq!(drain_all(&mut recv), b"abcdefgh");
    }

    #[test]
    fn contained_overlap_is_not_duplicated() {
        let data = bytes(0..50);
        let mut recv = synchronized(256);
        let base = IRS + 1;
        // [100, 150) then [120, 140), offset by the stream start.
        recv.admit(&data, base + 100, Flags::NONE).unwrap();
        assert_eq!(recv.admit(&data[20..40], base + 120, Flags::NONE), Ok(20));
        assert_eq!(recv.segment_count(), 1);

        let fill = vec![0xff; 100];
        recv.admit(&fill, base, Flags::NONE).unwrap();
        let out = drain_all(&mut recv);
        assert_eq!(out.len(), 150);
        assert_eq!(&out[100..], &data[..]);
    }

    #[test]
    fn overlap_with_later_segment() {
        let data = bytes(0..60);
        let mut recv = synchronized(256);
        let base = IRS + 1;
        // [100, 150) then [90, 110): the second one shrinks to [90, 100).
        recv.admit(&data[10..60], base + 100, Flags::NONE).unwrap();
        assert_eq!(recv.admit(&data[0..20], base + 90, Flags::NONE), Ok(20));
        let lens: Vec<_> = recv.segments().map(|s| (s.seq, s.len)).collect();
        assert_eq!(lens, [(base + 90, 10), (base + 100, 50)]);

        recv.admit(&[0; 90], base, Flags::NONE).unwrap();
        assert_eq!(recv.ack_number(), base + 150);
        let out = drain_all(&mut recv);
        assert_eq!(&out[90..], &data[..]);
    }

    #[test]
    fn tail_overlap_is_trimmed() {
        let mut recv = synchronized(64);
        recv.admit(b"cd", IRS + 3, Flags::NONE).unwrap();
        // The front of the old segment survives, its tail is cut at the held one.
        recv.admit(b"XYcdef", IRS + 1, Flags::NONE).unwrap();
        assert_eq!(recv.ack_number(), IRS + 5);
        assert_eq!(drain_all(&mut recv), b"XYcd");
    }

    #[test]
    fn partial_duplicate_below_cursor() {
        let mut recv = synchronized(64);
        recv.admit(b"abc", IRS + 1, Flags::NONE).unwrap();
        assert_eq!(recv.admit(b"bcde", IRS + 2, Flags::NONE), Ok(4));
        assert_eq!(recv.ack_number(), IRS + 6);
        assert_eq!(drain_all(&mut recv), b"abcde");
    }

    #[test]
    fn window_truncates() {
        let mut recv = synchronized(4);
        assert_eq!(recv.admit(b"abcdef", IRS + 1, Flags::FIN), Ok(4));
        assert_eq!(recv.ack_number(), IRS + 5);
        assert_eq!(recv.window_size(), 0);
        assert!(!recv.fin_received());
        assert_eq!(drain_all(&mut recv), b"abcd");
        assert_eq!(recv.window_size(), 4);
    }

    #[test]
    fn drain_keeps_segments_whole() {
        let mut recv = synchronized(64);
        recv.admit(b"abc", IRS + 1, Flags::NONE).unwrap();
        recv.admit(b"defg", IRS + 4, Flags::NONE).unwrap();

        let mut buf = [0; 5];
        assert_eq!(recv.drain(&mut buf), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(recv.next_len(), Some(4));
        assert_eq!(recv.drain(&mut buf[..2]), 0);
        assert_eq!(recv.drain(&mut buf), 4);
        assert_eq!(&buf[..4], b"defg");
    }

    #[test]
    fn fin_in_order() {
        let mut recv = synchronized(64);
        recv.admit(b"bye", IRS + 1, Flags::FIN | Flags::ACK).unwrap();
        assert!(recv.fin_received());
        assert_eq!(recv.ack_number(), IRS + 5);
        assert!(!recv.is_finished());
        assert_eq!(drain_all(&mut recv), b"bye");
        assert!(recv.is_finished());
    }

    #[test]
    fn fin_out_of_order() {
        let mut recv = synchronized(64);
        recv.admit(&[], IRS + 4, Flags::FIN).unwrap();
        assert!(!recv.fin_received());
        recv.admit(b"abc", IRS + 1, Flags::NONE).unwrap();
        assert!(recv.fin_received());
        assert_eq!(recv.ack_number(), IRS + 5);
        assert_eq!(drain_all(&mut recv), b"abc");
        assert_eq!(recv.segment_count(), 0);
    }

    #[test]
    fn wraps_sequence_space() {
        let irs = SeqNumber(0xffff_fffa);
        let mut recv = RecvBuffer::new(32);
        recv.set_initial_sequence(irs);
        recv.admit(&[], irs, Flags::SYN).unwrap();
        recv.admit(b"0123456789", irs + 1, Flags::NONE).unwrap();
        assert_eq!(recv.ack_number(), SeqNumber(5));
        assert_eq!(drain_all(&mut recv), b"0123456789");
    }

    #[test]
    fn window_acceptance() {
        let mut recv = synchronized(8);
        assert!(recv.accepts(IRS + 1, 0));
        assert!(recv.accepts(IRS + 8, 4));
        assert!(!recv.accepts(IRS + 9, 1));
        assert!(recv.accepts(IRS, 2));
        assert!(!recv.accepts(IRS, 1));
        assert!(recv.is_duplicate(IRS, 1));

        recv.admit(&[0; 8], IRS + 1, Flags::NONE).unwrap();
        assert_eq!(recv.window_size(), 0);
        assert!(recv.accepts(IRS + 9, 0));
        assert!(!recv.accepts(IRS + 10, 0));
        assert!(!recv.accepts(IRS + 9, 1));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arrival_order_does_not_matter(
                cuts in proptest::collection::vec(1usize..40, 1..12),
                order in proptest::collection::vec(any::<prop::sample::Index>(), 12),
                irs in any::<u32>(),
            ) {
                let irs = SeqNumber(irs);
                let stream: Vec<u8> = (0..cuts.iter().sum::<usize>()).map(|i| i as u8).collect();

                let mut pieces = Vec::new();
                let mut start = 0;
                for len in &cuts {
                    pieces.push((start, *len));
                    start += len;
                }
                let mut shuffled = pieces.clone();
                for (i, idx) in order.iter().enumerate().take(shuffled.len()) {
                    let other = idx.index(shuffled.len());
                    shuffled.swap(i, other);
                }

                let mut recv = RecvBuffer::new(1024);
                recv.set_initial_sequence(irs);
                recv.admit(&[], irs, Flags::SYN).unwrap();
                for &(start, len) in shuffled.iter().chain(pieces.iter()) {
                    let accepted = recv.admit(&stream[start..start + len], irs + 1 + start, Flags::NONE);
                    prop_assert_eq!(accepted, Ok(len));
                }

                prop_assert_eq!(recv.ack_number(), irs + 1 + stream.len());
                let mut out = vec![0; stream.len()];
                prop_assert_eq!(recv.drain(&mut out), stream.len());
                prop_assert_eq!(out, stream);
            }
        }
    }
}
