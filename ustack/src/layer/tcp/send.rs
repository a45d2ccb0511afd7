//! The send side: sequencing, flow and congestion control, retransmission.
use crate::layer::{Error, Result};
use crate::managed::Ordered;
use crate::storage::RingStore;
use crate::time::{Expiration, Instant};
use crate::wire::{TcpFlags as Flags, TcpSeqNumber as SeqNumber};

use super::config::Config;
use super::congestion::Congestion;
use super::rtt::RttEstimator;
use super::segment::Segment;

/// The narrow transmit capability of the send buffer.
///
/// The implementor stamps acknowledgment number and window at the time of the call and hands the
/// segment to the device.
pub trait Emit {
    /// Transmit a segment with the given sequence number, flags and payload.
    fn emit(&mut self, seq: SeqNumber, flags: Flags, payload: &[u8]) -> Result<usize>;
}

/// Outgoing segments and their retransmission state.
///
/// Enqueued segments wait in `unsent` until congestion and peer window admit them, then move to
/// `in_flight` until acknowledged. Every in-flight segment precedes every unsent one in sequence
/// space. The bytes in flight never exceed the smaller of the two windows.
#[derive(Debug)]
pub struct SendBuffer {
    store: RingStore,
    mss: usize,
    /// Oldest unacknowledged sequence number.
    una: SeqNumber,
    /// Next sequence number to assign.
    nxt: SeqNumber,
    /// One past the highest sequence number ever sent.
    snd_max: SeqNumber,
    in_flight: Ordered<Segment>,
    unsent: Ordered<Segment>,
    /// Sequence space occupied by `in_flight`.
    flight: usize,
    congestion: Congestion,
    rtt: RttEstimator,
    peer_window: usize,
    expiry: Expiration,
    max_retransmissions: Option<u32>,
    /// Sequence number of our FIN, once queued.
    fin: Option<SeqNumber>,
    scratch: Vec<u8>,
}

impl SendBuffer {
    /// An empty buffer starting at the initial send sequence number.
    pub fn new(config: &Config, iss: SeqNumber) -> Self {
        let mss = config.mss.max(1);
        SendBuffer {
            store: RingStore::new(config.buffer_size),
            mss,
            una: iss,
            nxt: iss,
            snd_max: iss,
            in_flight: Ordered::new(),
            unsent: Ordered::new(),
            flight: 0,
            congestion: Congestion::new(mss, config.buffer_size.max(mss)),
            rtt: RttEstimator::new(config.initial_rto, config.rto_min, config.rto_max),
            peer_window: Config::MAX_WINDOW,
            expiry: Expiration::Never,
            max_retransmissions: config.max_retransmissions,
            fin: None,
            scratch: vec![0; mss],
        }
    }

    /// Queue a payload with control flags and send as much as the windows allow.
    ///
    /// Payloads longer than the MSS are split, the SYN goes with the first and the FIN with the
    /// last piece. The payload is accepted completely or not at all: without the room in the store
    /// this fails with `Exhausted`. A failed transmission is reported as `Unreachable`, the data
    /// stays queued and is retransmitted in any case.
    pub fn enqueue(&mut self, payload: &[u8], flags: Flags, now: Instant, emit: &mut impl Emit)
        -> Result<usize>
    {
        if payload.len() > self.store.free() {
            net_debug!("send buffer exhausted, {} bytes queued", self.store.len());
            return Err(Error::Exhausted);
        }
        if payload.is_empty() && flags.sequence_len() == 0 {
            return Ok(0);
        }

        let base = flags.without(Flags::SYN | Flags::FIN);
        let mut syn = flags.syn();
        let mut fin = flags.fin();
        let mut rest = payload;

        loop {
            let mut seg_flags = base;
            let mut room = self.mss;
            if syn {
                seg_flags |= Flags::SYN;
                room -= 1;
                syn = false;
            }

            let take = rest.len().min(room);
            let (chunk, tail) = rest.split_at(take);
            if fin && tail.is_empty() && take < room {
                seg_flags |= Flags::FIN;
                fin = false;
            }

            self.push(chunk, seg_flags)?;
            rest = tail;
            if rest.is_empty() && !fin {
                break;
            }
        }

        self.flush(now, emit)?;
        Ok(payload.len())
    }

    fn push(&mut self, chunk: &[u8], flags: Flags) -> Result<()> {
        let offset = self.store.tail();
        self.store.write(offset, chunk)?;
        let segment = Segment::new(self.nxt, chunk.len(), flags, offset);
        if flags.fin() {
            self.fin = Some(segment.end() - 1);
        }
        self.nxt = segment.end();
        self.unsent.insert(segment);
        Ok(())
    }

    /// The bytes that may be in flight.
    pub fn send_window(&self) -> usize {
        self.congestion.window().min(self.peer_window)
    }

    /// Move queued segments into flight while the windows allow.
    ///
    /// Segments that no longer fit a shrunken window are taken back first.
    pub fn flush(&mut self, now: Instant, emit: &mut impl Emit) -> Result<()> {
        let limit = self.send_window();
        self.shrink(limit);

        let mut result = Ok(());
        while let Some(&segment) = self.unsent.first() {
            if self.flight + segment.sequence_len() > limit {
                break;
            }

            let mut segment = segment;
            self.unsent.pop_first();
            if self.in_flight.is_empty() {
                self.restart_timer(now);
            }
            if segment.sent_at.is_some() {
                segment.retransmits += 1;
            }
            segment.sent_at = Some(now);
            self.flight += segment.sequence_len();
            self.snd_max = self.snd_max.max(segment.end());
            self.in_flight.insert(segment);

            if let Err(err) = self.transmit(&segment, emit) {
                result = Err(err);
            }
        }
        result
    }

    fn shrink(&mut self, limit: usize) {
        while self.flight > limit {
            let segment = match self.in_flight.pop_last() {
                Some(segment) => segment,
                None => break,
            };
            self.flight -= segment.sequence_len();
            self.unsent.insert(segment);
        }
        if self.in_flight.is_empty() {
            self.expiry = Expiration::Never;
        }
    }

    fn transmit(&mut self, segment: &Segment, emit: &mut impl Emit) -> Result<()> {
        let payload = &mut self.scratch[..segment.len];
        let len = self.store.read(segment.offset, payload);
        debug_assert_eq!(len, segment.len);

        net_trace!("send seq={} len={} [{}] retransmits={}",
            segment.seq, segment.len, segment.flags, segment.retransmits);
        match emit.emit(segment.seq, segment.flags, payload) {
            Ok(_) => Ok(()),
            Err(err) => {
                net_warn!("transmission of seq={} failed: {}", segment.seq, err);
                Err(Error::Unreachable)
            },
        }
    }

    fn restart_timer(&mut self, now: Instant) {
        self.expiry = Expiration::When(now + self.rtt.rto());
    }

    /// Check if an acknowledgment number covers new data that was actually sent.
    pub fn is_acceptable(&self, ack: SeqNumber) -> bool {
        self.una < ack && ack <= self.snd_max
    }

    /// Process an acknowledgment from the peer.
    ///
    /// Stale and duplicate acknowledgments, or those for data never sent, are ignored. Otherwise
    /// every segment covered completely is retired, the first one never retransmitted yields a
    /// round-trip sample, the congestion window grows and queued data is flushed.
    pub fn handle_ack(&mut self, ack: SeqNumber, now: Instant, emit: &mut impl Emit) -> Result<()> {
        if self.retire(ack, now) {
            self.flush(now, emit)
        } else {
            Ok(())
        }
    }

    /// Process acknowledgment and window of one inbound segment.
    ///
    /// The advertised window takes effect before anything is admitted, then queued data is flushed
    /// once. A window update without new acknowledgment flushes as well.
    pub fn handle_segment(
        &mut self,
        ack: SeqNumber,
        window: usize,
        now: Instant,
        emit: &mut impl Emit,
    ) -> Result<()> {
        self.peer_window = window;
        self.retire(ack, now);
        self.flush(now, emit)
    }

    /// Retire the segments covered by `ack`, returning whether any were.
    fn retire(&mut self, ack: SeqNumber, now: Instant) -> bool {
        if !self.is_acceptable(ack) {
            net_debug!("ignoring ack={}, expected ({}, {}]", ack, self.una, self.snd_max);
            return false;
        }

        let mut acked = 0;
        let mut sampled = false;
        while let Some(&segment) = self.in_flight.first() {
            if ack < segment.end() {
                break;
            }
            self.in_flight.pop_first();
            self.flight -= segment.sequence_len();
            acked += segment.sequence_len();

            if !sampled && segment.retransmits == 0 {
                if let Some(sent_at) = segment.sent_at {
                    self.rtt.sample(now - sent_at);
                }
                sampled = true;
            }
        }
        // Taken back after a timeout but received by the peer all along.
        while let Some(&segment) = self.unsent.first() {
            if ack < segment.end() {
                break;
            }
            self.unsent.pop_first();
            acked += segment.sequence_len();
        }

        self.una = ack;
        if acked == 0 {
            return false;
        }

        self.congestion.on_ack(acked);
        let keep = self.in_flight.first()
            .or_else(|| self.unsent.first())
            .map(|segment| segment.offset)
            .unwrap_or_else(|| self.store.tail());
        self.store.release(keep);

        if self.in_flight.is_empty() {
            self.expiry = Expiration::Never;
        } else {
            self.restart_timer(now);
        }
        true
    }

    /// Retransmit the earliest segment in flight once the timer expired.
    ///
    /// The congestion window collapses to one segment, everything behind the earliest segment is
    /// taken back to the queue and the timeout backs off. Returns `TimedOut` without sending when
    /// the earliest segment was already retransmitted the configured maximum number of times.
    pub fn handle_rto(&mut self, now: Instant, emit: &mut impl Emit) -> Result<()> {
        if !self.expiry.is_expired(now) {
            return Ok(());
        }

        let earliest = match self.in_flight.first() {
            Some(segment) => *segment,
            None => {
                self.expiry = Expiration::Never;
                return Ok(());
            },
        };

        if let Some(limit) = self.max_retransmissions {
            if earliest.retransmits >= limit {
                net_warn!("seq={} retransmitted {} times, giving up", earliest.seq, limit);
                return Err(Error::TimedOut);
            }
        }

        net_debug!("rto of {:?} fired for seq={}", self.rtt.rto(), earliest.seq);
        self.congestion.on_timeout();
        while self.in_flight.len() > 1 {
            if let Some(segment) = self.in_flight.pop_last() {
                self.flight -= segment.sequence_len();
                self.unsent.insert(segment);
            }
        }

        let segment = match self.in_flight.first_mut() {
            Some(segment) => {
                segment.retransmits += 1;
                segment.sent_at = Some(now);
                *segment
            },
            None => return Ok(()),
        };

        self.rtt.back_off();
        self.restart_timer(now);
        self.transmit(&segment, emit)
    }

    /// Record the window advertised by the peer and send what now fits.
    pub fn set_peer_window(&mut self, window: usize, now: Instant, emit: &mut impl Emit)
        -> Result<()>
    {
        self.peer_window = window;
        self.flush(now, emit)
    }

    /// Add ACK to our queued SYN and send it again immediately.
    ///
    /// This answers a SYN of the peer while ours is outstanding, or its retransmission.
    pub fn resend_syn(&mut self, now: Instant, emit: &mut impl Emit) -> Result<()> {
        if let Some(segment) = self.unsent.first_mut() {
            if segment.flags.syn() {
                segment.flags |= Flags::ACK;
                return self.flush(now, emit);
            }
        }

        let segment = match self.in_flight.first_mut() {
            Some(segment) if segment.flags.syn() => {
                segment.flags |= Flags::ACK;
                segment.retransmits += 1;
                segment.sent_at = Some(now);
                *segment
            },
            _ => return Ok(()),
        };
        self.restart_timer(now);
        self.transmit(&segment, emit)
    }

    /// The sequence number of the next segment to go on the wire.
    ///
    /// Used for segments that occupy no sequence space, i.e. bare acknowledgments.
    pub fn sequence_number(&self) -> SeqNumber {
        self.unsent.first()
            .map(|segment| segment.seq)
            .unwrap_or(self.nxt)
    }

    /// The oldest unacknowledged sequence number.
    pub fn unacknowledged(&self) -> SeqNumber {
        self.una
    }

    /// Whether a FIN was queued and the peer acknowledged it.
    pub fn fin_acked(&self) -> bool {
        match self.fin {
            Some(fin) => fin < self.una,
            None => false,
        }
    }

    /// Whether everything queued has been acknowledged.
    pub fn is_empty(&self) -> bool {
        self.una == self.nxt
    }

    /// When the retransmission timer fires.
    pub fn rto_expiry(&self) -> Expiration {
        self.expiry
    }

    /// Sequence space in flight.
    pub fn bytes_in_flight(&self) -> usize {
        self.flight
    }

    /// The congestion window.
    pub fn congestion_window(&self) -> usize {
        self.congestion.window()
    }

    /// The slow start threshold.
    pub fn ssthresh(&self) -> usize {
        self.congestion.ssthresh()
    }

    /// The window last advertised by the peer.
    pub fn peer_window(&self) -> usize {
        self.peer_window
    }

    /// The round-trip estimator.
    pub fn rtt(&self) -> &RttEstimator {
        &self.rtt
    }

    /// Room for further payload.
    pub fn free(&self) -> usize {
        self.store.free()
    }

    /// Segments sent and not yet acknowledged, in sequence order.
    pub fn in_flight(&self) -> impl Iterator<Item=&Segment> + '_ {
        self.in_flight.iter()
    }

    /// Segments waiting for the window, in sequence order.
    pub fn unsent(&self) -> impl Iterator<Item=&Segment> + '_ {
        self.unsent.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Duration;

    const ISS: SeqNumber = SeqNumber(5000);

    #[derive(Default)]
    struct Recorder {
        sent: Vec<(SeqNumber, Flags, Vec<u8>)>,
        fail: bool,
    }

    impl Emit for Recorder {
        fn emit(&mut self, seq: SeqNumber, flags: Flags, payload: &[u8]) -> Result<usize> {
            if self.fail {
                return Err(Error::Unreachable);
            }
            self.sent.push((seq, flags, payload.to_vec()));
            Ok(payload.len())
        }
    }

    fn config(mss: usize) -> Config {
        Config { mss, buffer_size: 8192, ..Config::default() }
    }

    fn at(millis: i64) -> Instant {
        Instant::from_millis(millis)
    }

    #[test]
    fn enqueue_sends_immediately() {
        let mut send = SendBuffer::new(&config(100), ISS);
        let mut out = Recorder::default();
        assert_eq!(send.enqueue(b"hello", Flags::PSH | Flags::ACK, at(0), &mut out), Ok(5));
        assert_eq!(out.sent, [(ISS, Flags::PSH | Flags::ACK, b"hello".to_vec())]);
        assert_eq!(send.bytes_in_flight(), 5);
        assert_eq!(send.sequence_number(), ISS + 5);
        assert_eq!(send.rto_expiry(), Expiration::When(at(200)));
    }

    #[test]
    fn control_segments_take_one() {
        let mut send = SendBuffer::new(&config(100), ISS);
        let mut out = Recorder::default();
        send.enqueue(&[], Flags::SYN, at(0), &mut out).unwrap();
        assert_eq!(send.sequence_number(), ISS + 1);
        send.handle_ack(ISS + 1, at(10), &mut out).unwrap();
        send.enqueue(&[], Flags::FIN | Flags::ACK, at(10), &mut out).unwrap();
        assert_eq!(send.sequence_number(), ISS + 2);
        assert!(!send.fin_acked());
        send.handle_ack(ISS + 2, at(20), &mut out).unwrap();
        assert!(send.fin_acked());
        assert!(send.is_empty());
    }

    #[test]
    fn segments_by_mss() {
        let mut send = SendBuffer::new(&config(4), ISS);
        let mut out = Recorder::default();
        send.enqueue(b"abcdefghij", Flags::ACK | Flags::FIN, at(0), &mut out).unwrap();
        let sent: Vec<_> = out.sent.iter()
            .map(|(seq, flags, data)| (seq.0 - ISS.0, *flags, data.as_slice()))
            .collect();
        assert_eq!(sent, [
            (0, Flags::ACK, &b"abcd"[..]),
            (4, Flags::ACK, &b"efgh"[..]),
            (8, Flags::ACK | Flags::FIN, &b"ij"[..]),
        ]);
        assert_eq!(send.unsent().count(), 0);
        assert_eq!(send.sequence_number(), ISS + 11);
    }

    #[test]
    fn fin_after_full_segment() {
        let mut send = SendBuffer::new(&config(4), ISS);
        let mut out = Recorder::default();
        send.enqueue(b"abcd", Flags::ACK | Flags::FIN, at(0), &mut out).unwrap();
        let lens: Vec<_> = send.in_flight().map(|s| (s.len, s.flags)).collect();
        assert_eq!(lens, [(4, Flags::ACK), (0, Flags::ACK | Flags::FIN)]);
    }

    #[test]
    fn backpressure() {
        let mut send = SendBuffer::new(&Config { buffer_size: 8, ..config(4) }, ISS);
        let mut out = Recorder::default();
        assert_eq!(send.enqueue(b"abcdef", Flags::ACK, at(0), &mut out), Ok(6));
        assert_eq!(send.enqueue(b"ghi", Flags::ACK, at(0), &mut out), Err(Error::Exhausted));
        assert_eq!(send.enqueue(b"gh", Flags::ACK, at(0), &mut out), Ok(2));
        send.handle_ack(ISS + 4, at(5), &mut out).unwrap();
        assert_eq!(send.free(), 4);
    }

    #[test]
    fn stale_acks_are_ignored() {
        let mut send = SendBuffer::new(&config(100), ISS);
        let mut out = Recorder::default();
        send.enqueue(b"abc", Flags::ACK, at(0), &mut out).unwrap();
        send.handle_ack(ISS, at(1), &mut out).unwrap();
        send.handle_ack(ISS + 10, at(1), &mut out).unwrap();
        assert_eq!(send.bytes_in_flight(), 3);
        send.handle_ack(ISS + 3, at(1), &mut out).unwrap();
        assert_eq!(send.bytes_in_flight(), 0);
        send.handle_ack(ISS + 3, at(2), &mut out).unwrap();
        assert_eq!(send.rto_expiry(), Expiration::Never);
    }

    #[test]
    fn rtt_sampled_on_ack() {
        let mut send = SendBuffer::new(&config(100), ISS);
        let mut out = Recorder::default();
        send.enqueue(b"abc", Flags::ACK, at(0), &mut out).unwrap();
        send.handle_ack(ISS + 3, at(40), &mut out).unwrap();
        assert_eq!(send.rtt().srtt(), Some(Duration::from_millis(40)));
    }

    #[test]
    fn retransmits_earliest_only() {
        let mut send = SendBuffer::new(&config(100), ISS);
        let mut out = Recorder::default();
        send.enqueue(b"first", Flags::ACK, at(0), &mut out).unwrap();
        send.enqueue(b"second", Flags::ACK, at(5), &mut out).unwrap();
        assert_eq!(out.sent.len(), 2);

        send.handle_rto(at(100), &mut out).unwrap();
        assert_eq!(out.sent.len(), 2);

        send.handle_rto(at(200), &mut out).unwrap();
        assert_eq!(out.sent.len(), 3);
        assert_eq!(out.sent[2], (ISS, Flags::ACK, b"first".to_vec()));
        assert_eq!(send.in_flight().map(|s| s.retransmits).collect::<Vec<_>>(), [1]);
        assert_eq!(send.unsent().count(), 1);
        assert_eq!(send.congestion_window(), 100);
        assert_eq!(send.ssthresh(), 200);
        assert_eq!(send.rto_expiry(), Expiration::When(at(600)));

        // Acknowledging the retransmission gives no sample but sends the second again.
        send.handle_ack(ISS + 5, at(250), &mut out).unwrap();
        assert_eq!(send.rtt().srtt(), None);
        assert_eq!(out.sent.len(), 4);
        assert_eq!(out.sent[3].2, b"second");
        assert_eq!(send.in_flight().map(|s| s.retransmits).collect::<Vec<_>>(), [1]);
    }

    #[test]
    fn gives_up_at_ceiling() {
        let mut send = SendBuffer::new(&Config { max_retransmissions: Some(2), ..config(100) }, ISS);
        let mut out = Recorder::default();
        send.enqueue(b"x", Flags::ACK, at(0), &mut out).unwrap();
        assert_eq!(send.handle_rto(at(200), &mut out), Ok(()));
        assert_eq!(send.handle_rto(at(600), &mut out), Ok(()));
        assert_eq!(send.handle_rto(at(1400), &mut out), Err(Error::TimedOut));
        assert_eq!(out.sent.len(), 3);
    }

    #[test]
    fn peer_window_limits() {
        let mut send = SendBuffer::new(&config(100), ISS);
        let mut out = Recorder::default();
        send.set_peer_window(150, at(0), &mut out).unwrap();
        send.enqueue(&[0; 100], Flags::ACK, at(0), &mut out).unwrap();
        send.enqueue(&[1; 100], Flags::ACK, at(0), &mut out).unwrap();
        assert_eq!(out.sent.len(), 1);

        send.set_peer_window(50, at(1), &mut out).unwrap();
        assert_eq!(send.bytes_in_flight(), 0);
        assert_eq!(send.rto_expiry(), Expiration::Never);

        send.set_peer_window(400, at(2), &mut out).unwrap();
        assert_eq!(send.bytes_in_flight(), 200);
        assert_eq!(out.sent.len(), 3);
        assert_eq!(send.in_flight().map(|s| s.retransmits).collect::<Vec<_>>(), [1, 0]);
    }

    #[test]
    fn window_of_ack_applies_first() {
        let mut send = SendBuffer::new(&config(100), ISS);
        let mut out = Recorder::default();
        send.enqueue(&[7; 600], Flags::ACK, at(0), &mut out).unwrap();
        assert_eq!(out.sent.len(), 4);

        send.handle_segment(ISS + 100, 0, at(10), &mut out).unwrap();
        assert_eq!(out.sent.len(), 4);
        assert_eq!(send.bytes_in_flight(), 0);
        assert_eq!(send.unacknowledged(), ISS + 100);

        // The window opens again without new acknowledgment.
        send.handle_segment(ISS + 100, 1000, at(20), &mut out).unwrap();
        assert_eq!(out.sent[4].0, ISS + 100);
        assert!(send.bytes_in_flight() > 0);
        assert!(send.bytes_in_flight() <= send.send_window());
    }

    #[test]
    fn transmit_failure_keeps_data() {
        let mut send = SendBuffer::new(&config(100), ISS);
        let mut out = Recorder { fail: true, ..Recorder::default() };
        assert_eq!(send.enqueue(b"abc", Flags::ACK, at(0), &mut out), Err(Error::Unreachable));
        assert_eq!(send.bytes_in_flight(), 3);

        out.fail = false;
        send.handle_rto(at(200), &mut out).unwrap();
        assert_eq!(out.sent, [(ISS, Flags::ACK, b"abc".to_vec())]);
    }

    #[test]
    fn simultaneous_open_acknowledges_syn() {
        let mut send = SendBuffer::new(&config(100), ISS);
        let mut out = Recorder::default();
        send.enqueue(&[], Flags::SYN, at(0), &mut out).unwrap();
        send.resend_syn(at(1), &mut out).unwrap();
        assert_eq!(out.sent[1], (ISS, Flags::SYN | Flags::ACK, vec![]));
        assert_eq!(send.sequence_number(), ISS + 1);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Enqueue(usize),
            Ack(usize),
            Timeout,
            Window(usize),
            Segment(usize, usize),
        }

        fn op() -> impl Strategy<Value=Op> {
            prop_oneof![
                (1usize..300).prop_map(Op::Enqueue),
                (0usize..1000).prop_map(Op::Ack),
                Just(Op::Timeout),
                (0usize..2000).prop_map(Op::Window),
                (0usize..1000, 0usize..2000).prop_map(|(len, window)| Op::Segment(len, window)),
            ]
        }

        proptest! {
            #[test]
            fn flight_within_windows(ops in proptest::collection::vec(op(), 1..64), iss in any::<u32>()) {
                let iss = SeqNumber(iss);
                let mut send = SendBuffer::new(&config(100), iss);
                let mut out = Recorder::default();
                let mut now = 0;

                for op in ops {
                    now += 10;
                    let result = match op {
                        Op::Enqueue(len) => send.enqueue(&vec![0; len], Flags::ACK, at(now), &mut out).map(drop),
                        Op::Ack(len) => {
                            let ack = send.unacknowledged() + len;
                            send.handle_ack(ack, at(now), &mut out)
                        },
                        Op::Timeout => {
                            now += 60_000;
                            send.handle_rto(at(now), &mut out)
                        },
                        Op::Window(window) => send.set_peer_window(window, at(now), &mut out),
                        Op::Segment(len, window) => {
                            let ack = send.unacknowledged() + len;
                            send.handle_segment(ack, window, at(now), &mut out)
                        },
                    };
                    prop_assert!(result == Ok(()) || result == Err(Error::Exhausted));
                    prop_assert!(send.bytes_in_flight() <= send.send_window());
                    let counted: usize = send.in_flight().map(Segment::sequence_len).sum();
                    prop_assert_eq!(counted, send.bytes_in_flight());
                    if let (Some(last), Some(next)) = (send.in_flight().last(), send.unsent().next()) {
                        prop_assert_eq!(last.end(), next.seq);
                    }
                }
            }
        }
    }
}
