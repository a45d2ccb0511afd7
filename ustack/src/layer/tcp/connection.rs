//! The per-connection protocol engine.
//!
//! A [`Connection`] consumes inbound segments and local operations and drives its two buffers.
//! It performs no I/O on its own and does not block: every operation that may transmit is handed
//! the [`Transmit`] capability of the interface, and the current time, by its caller.
//!
//! [`Connection`]: struct.Connection.html
//! [`Transmit`]: trait.Transmit.html
use crate::layer::{Error, Result};
use crate::time::{Expiration, Instant};
use crate::wire::{Endpoint, FourTuple, TcpFlags as Flags, TcpRepr, TcpSeqNumber as SeqNumber};

use super::config::Config;
use super::recv::RecvBuffer;
use super::send::{Emit, SendBuffer};
use super::siphash::IsnGenerator;
use super::state::State;

/// A fully stamped outgoing segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outgoing<'a> {
    /// Source and destination.
    pub tuple: FourTuple,
    /// The sequence number.
    pub seq: SeqNumber,
    /// The acknowledgment number, only meaningful with ACK set.
    pub ack: SeqNumber,
    /// Control flags.
    pub flags: Flags,
    /// The receive window to advertise.
    pub window: u16,
    /// The payload.
    pub payload: &'a [u8],
}

/// The capability of putting segments on the wire.
pub trait Transmit {
    /// Encode and send one segment, returning the number of bytes handed to the device.
    fn transmit(&self, segment: &Outgoing) -> Result<usize>;
}

/// Stamps segments of the send buffer with the current receive state.
struct Stamp<'a, T: ?Sized> {
    tx: &'a T,
    tuple: FourTuple,
    recv: &'a RecvBuffer,
}

/// The state of one connection.
#[derive(Debug)]
pub struct Connection {
    state: State,
    /// The address bound by the application, possibly with an unspecified address.
    bound: Endpoint,
    tuple: FourTuple,
    config: Config,
    isn: IsnGenerator,
    send: SendBuffer,
    recv: RecvBuffer,
    time_wait: Expiration,
    error: Option<Error>,
    synchronized: bool,
}

impl Outgoing<'_> {
    /// The header to emit for this segment.
    pub fn repr(&self) -> TcpRepr {
        TcpRepr {
            src_port: self.tuple.local.port,
            dst_port: self.tuple.remote.port,
            flags: self.flags,
            seq_number: self.seq,
            ack_number: self.ack,
            window_len: self.window,
            payload_len: self.payload.len() as u16,
        }
    }
}

impl<T: Transmit + ?Sized> Emit for Stamp<'_, T> {
    fn emit(&mut self, seq: SeqNumber, flags: Flags, payload: &[u8]) -> Result<usize> {
        self.tx.transmit(&Outgoing {
            tuple: self.tuple,
            seq,
            ack: self.recv.ack_number(),
            flags,
            window: advertised(self.recv),
            payload,
        })
    }
}

fn advertised(recv: &RecvBuffer) -> u16 {
    recv.window_size().min(Config::MAX_WINDOW) as u16
}

impl Connection {
    /// A closed connection.
    pub fn new(config: Config, isn: IsnGenerator) -> Self {
        let config = config.clamped();
        Connection {
            state: State::Closed,
            bound: Endpoint::default(),
            tuple: FourTuple { local: Endpoint::default(), remote: Endpoint::default() },
            send: SendBuffer::new(&config, SeqNumber::default()),
            recv: RecvBuffer::new(config.buffer_size),
            config,
            isn,
            time_wait: Expiration::Never,
            error: None,
            synchronized: false,
        }
    }

    /// The current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The local and the remote endpoint.
    pub fn tuple(&self) -> FourTuple {
        self.tuple
    }

    /// The endpoint the connection was bound to.
    pub fn bound(&self) -> Endpoint {
        self.bound
    }

    /// The outgoing buffer.
    pub fn send_buffer(&self) -> &SendBuffer {
        &self.send
    }

    /// The incoming buffer.
    pub fn recv_buffer(&self) -> &RecvBuffer {
        &self.recv
    }

    /// The reason the connection was aborted, if it was.
    pub fn error(&self) -> Option<Error> {
        self.error
    }

    /// Whether the handshake completed since the last connect or listen.
    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    /// When TIME-WAIT ends.
    pub fn time_wait(&self) -> Expiration {
        self.time_wait
    }

    fn parts<'a, T: Transmit + ?Sized>(&'a mut self, tx: &'a T)
        -> (&'a mut SendBuffer, Stamp<'a, T>)
    {
        let stamp = Stamp { tx, tuple: self.tuple, recv: &self.recv };
        (&mut self.send, stamp)
    }

    fn set_state(&mut self, state: State) {
        if self.state != state {
            net_trace!("{}: {} -> {}", self.tuple, self.state, state);
            self.state = state;
        }
    }

    /// Forget the peer and drop everything queued in both directions.
    fn reset_buffers(&mut self) {
        self.send = SendBuffer::new(&self.config, self.send.sequence_number());
        self.recv.set_initial_sequence(SeqNumber::default());
        self.time_wait = Expiration::Never;
    }

    /// Force the connection closed.
    fn abort(&mut self, error: Error) {
        if self.state == State::Closed {
            return;
        }
        net_warn!("{}: aborted in {}: {}", self.tuple, self.state, error);
        self.error = Some(error);
        self.set_state(State::Closed);
        self.reset_buffers();
    }

    fn enter_time_wait(&mut self, now: Instant) {
        self.set_state(State::TimeWait);
        self.time_wait = Expiration::When(now + self.config.time_wait);
    }

    /// Send a segment occupying no sequence space.
    fn answer<T: Transmit + ?Sized>(&self, flags: Flags, tx: &T) {
        let segment = Outgoing {
            tuple: self.tuple,
            seq: self.send.sequence_number(),
            ack: self.recv.ack_number(),
            flags,
            window: advertised(&self.recv),
            payload: &[],
        };
        net_trace!("{}: answer {}", self.tuple, segment.repr());
        if let Err(err) = tx.transmit(&segment) {
            net_warn!("{}: sending {} failed: {}", self.tuple, flags, err);
        }
    }

    /// Answer an unacceptable segment with a reset.
    fn reset_peer<T: Transmit + ?Sized>(&self, seg: &TcpRepr, tuple: FourTuple, tx: &T) {
        let (seq, ack, flags) = if seg.flags.ack() {
            (seg.ack_number, SeqNumber::default(), Flags::RST)
        } else {
            (SeqNumber::default(), seg.seq_number + seg.sequence_len(), Flags::RST | Flags::ACK)
        };
        let segment = Outgoing { tuple, seq, ack, flags, window: 0, payload: &[] };
        if let Err(err) = tx.transmit(&segment) {
            net_warn!("{}: sending reset failed: {}", tuple, err);
        }
    }

    /// Process an inbound segment.
    ///
    /// `tuple` is the segment's address pair from the local point of view. Returns the control
    /// flags of the immediate answer, if one was sent: a bare ACK, a SYN|ACK or a RST.
    pub fn arrives<T: Transmit + ?Sized>(
        &mut self,
        seg: &TcpRepr,
        tuple: FourTuple,
        payload: &[u8],
        now: Instant,
        tx: &T,
    ) -> Option<Flags> {
        let flags = seg.flags.without(Flags::PSH | Flags::URG);
        net_trace!("{}: {} in {}", tuple, seg, self.state);

        let connected = self.state != State::Closed && self.state != State::Listen;
        if connected && tuple.remote != self.tuple.remote {
            net_debug!("{}: dropping segment of {}", self.tuple, tuple.remote);
            return None;
        }

        if flags.rst() {
            if self.state != State::Closed {
                self.abort(Error::Reset);
            }
            return None;
        }

        if self.state == State::Established && flags == Flags::SYN | Flags::ACK
            && self.recv.is_duplicate(seg.seq_number, seg.sequence_len())
        {
            // Our ACK of the handshake got lost.
            net_debug!("{}: duplicate SYN|ACK, acknowledging again", self.tuple);
            self.answer(Flags::ACK, tx);
            return Some(Flags::ACK);
        }

        if !self.state.accepts(flags) {
            net_debug!("{}: [{}] not acceptable in {}", tuple, flags, self.state);
            self.reset_peer(seg, tuple, tx);
            self.abort(Error::Reset);
            return Some(Flags::RST);
        }

        match self.state {
            State::Listen => return self.accept_syn(seg, tuple, payload, now, tx),
            State::SynSent => return self.syn_sent(seg, tuple, payload, now, tx),
            State::SynReceived if flags == Flags::SYN => {
                // Our SYN|ACK was lost, the peer tries again.
                let (send, mut stamp) = self.parts(tx);
                if let Err(err) = send.resend_syn(now, &mut stamp) {
                    net_warn!("{}: resending SYN failed: {}", self.tuple, err);
                }
                return Some(Flags::SYN | Flags::ACK);
            },
            State::SynReceived if flags == Flags::FIN => {
                net_debug!("{}: handshake abandoned by peer", self.tuple);
                self.tuple.remote = Endpoint::default();
                self.tuple.local = self.bound;
                self.reset_buffers();
                self.set_state(State::Listen);
                return None;
            },
            _ => (),
        }

        if !self.state.is_handshake() {
            let len = seg.sequence_len();
            if !self.recv.accepts(seg.seq_number, len) {
                if self.recv.is_duplicate(seg.seq_number, len) {
                    net_debug!("{}: duplicate seq={}, acknowledging again", self.tuple, seg.seq_number);
                    if self.state == State::TimeWait && flags.fin() {
                        self.enter_time_wait(now);
                    }
                    self.answer(Flags::ACK, tx);
                    return Some(Flags::ACK);
                }
                net_debug!("{}: seq={} outside of window", self.tuple, seg.seq_number);
                return None;
            }
        }

        if self.state == State::SynReceived {
            if !self.send.is_acceptable(seg.ack_number) {
                net_debug!("{}: ack={} does not acknowledge our SYN", self.tuple, seg.ack_number);
                self.reset_peer(seg, tuple, tx);
                self.abort(Error::Reset);
                return Some(Flags::RST);
            }
            self.set_state(State::Established);
            self.synchronized = true;
        }

        if flags.ack() {
            self.process_ack(seg, now, tx);
        }

        let mut reply = None;
        let fin_before = self.recv.fin_received();
        if self.state.receives() && (!payload.is_empty() || flags.fin()) {
            if let Err(err) = self.recv.admit(payload, seg.seq_number, seg.flags) {
                net_warn!("{}: admitting seq={} failed: {}", self.tuple, seg.seq_number, err);
            }
            reply = Some(Flags::ACK);
        }
        let fin_now = !fin_before && self.recv.fin_received();

        match self.state {
            State::Established if fin_now => self.set_state(State::CloseWait),
            State::FinWait1 => match (fin_now, self.send.fin_acked()) {
                (true, true) => self.enter_time_wait(now),
                (true, false) => self.set_state(State::Closing),
                (false, true) => self.set_state(State::FinWait2),
                (false, false) => (),
            },
            State::FinWait2 if fin_now => self.enter_time_wait(now),
            State::Closing if self.send.fin_acked() => self.enter_time_wait(now),
            State::LastAck if self.send.fin_acked() => self.set_state(State::Closed),
            _ => (),
        }

        if let Some(flags) = reply {
            self.answer(flags, tx);
        }
        reply
    }

    fn process_ack<T: Transmit + ?Sized>(&mut self, seg: &TcpRepr, now: Instant, tx: &T) {
        let window = usize::from(seg.window_len);
        let (send, mut stamp) = self.parts(tx);
        if let Err(err) = send.handle_segment(seg.ack_number, window, now, &mut stamp) {
            net_warn!("{}: sending after ack failed: {}", self.tuple, err);
        }
    }

    fn accept_syn<T: Transmit + ?Sized>(
        &mut self,
        seg: &TcpRepr,
        tuple: FourTuple,
        payload: &[u8],
        now: Instant,
        tx: &T,
    ) -> Option<Flags> {
        self.tuple = tuple;
        let iss = self.isn.get_isn(tuple, now);
        self.send = SendBuffer::new(&self.config, iss);
        self.recv.set_initial_sequence(seg.seq_number);
        if let Err(err) = self.recv.admit(payload, seg.seq_number, seg.flags) {
            net_warn!("{}: admitting SYN failed: {}", self.tuple, err);
        }
        self.set_state(State::SynReceived);

        let window = usize::from(seg.window_len);
        let (send, mut stamp) = self.parts(tx);
        let result = send.set_peer_window(window, now, &mut stamp)
            .and_then(|()| send.enqueue(&[], Flags::SYN | Flags::ACK, now, &mut stamp));
        if let Err(err) = result {
            net_warn!("{}: sending SYN|ACK failed: {}", self.tuple, err);
        }
        Some(Flags::SYN | Flags::ACK)
    }

    fn syn_sent<T: Transmit + ?Sized>(
        &mut self,
        seg: &TcpRepr,
        tuple: FourTuple,
        payload: &[u8],
        now: Instant,
        tx: &T,
    ) -> Option<Flags> {
        if !seg.flags.ack() {
            // Simultaneous open.
            self.recv.set_initial_sequence(seg.seq_number);
            if let Err(err) = self.recv.admit(payload, seg.seq_number, seg.flags) {
                net_warn!("{}: admitting SYN failed: {}", self.tuple, err);
            }
            self.set_state(State::SynReceived);
            let (send, mut stamp) = self.parts(tx);
            if let Err(err) = send.resend_syn(now, &mut stamp) {
                net_warn!("{}: sending SYN|ACK failed: {}", self.tuple, err);
            }
            return Some(Flags::SYN | Flags::ACK);
        }

        if !self.send.is_acceptable(seg.ack_number) {
            net_debug!("{}: ack={} does not acknowledge our SYN", self.tuple, seg.ack_number);
            self.reset_peer(seg, tuple, tx);
            self.abort(Error::Reset);
            return Some(Flags::RST);
        }

        self.recv.set_initial_sequence(seg.seq_number);
        if let Err(err) = self.recv.admit(payload, seg.seq_number, seg.flags) {
            net_warn!("{}: admitting SYN|ACK failed: {}", self.tuple, err);
        }
        self.process_ack(seg, now, tx);
        self.set_state(State::Established);
        self.synchronized = true;
        self.answer(Flags::ACK, tx);
        Some(Flags::ACK)
    }

    /// Advance the timers: end TIME-WAIT and retransmit on timeout.
    ///
    /// Returns `true` if the state changed.
    pub fn poll<T: Transmit + ?Sized>(&mut self, now: Instant, tx: &T) -> bool {
        if self.state == State::TimeWait && self.time_wait.is_expired(now) {
            self.set_state(State::Closed);
            self.time_wait = Expiration::Never;
            return true;
        }

        let (send, mut stamp) = self.parts(tx);
        match send.handle_rto(now, &mut stamp) {
            Ok(()) => false,
            Err(Error::TimedOut) => {
                self.abort(Error::TimedOut);
                true
            },
            Err(err) => {
                net_warn!("{}: retransmission failed: {}", self.tuple, err);
                false
            },
        }
    }

    /// Record the local endpoint.
    pub fn bind(&mut self, local: Endpoint) -> Result<()> {
        if self.state != State::Closed {
            return Err(Error::Illegal);
        }
        self.bound = local;
        self.tuple.local = local;
        Ok(())
    }

    /// Start an active open by sending a SYN.
    ///
    /// Requires a bound, concrete local address. The handshake completes on a later segment.
    pub fn connect<T: Transmit + ?Sized>(&mut self, remote: Endpoint, now: Instant, tx: &T)
        -> Result<()>
    {
        if self.state != State::Closed || !self.bound.is_specified() || !remote.is_specified() {
            return Err(Error::Illegal);
        }

        self.tuple = FourTuple { local: self.bound, remote };
        self.error = None;
        self.synchronized = false;
        self.send = SendBuffer::new(&self.config, self.isn.get_isn(self.tuple, now));
        self.recv.set_initial_sequence(SeqNumber::default());
        self.time_wait = Expiration::Never;
        self.set_state(State::SynSent);

        let (send, mut stamp) = self.parts(tx);
        if let Err(err) = send.enqueue(&[], Flags::SYN, now, &mut stamp) {
            self.set_state(State::Closed);
            self.reset_buffers();
            return Err(err);
        }
        Ok(())
    }

    /// Start a passive open.
    pub fn listen(&mut self) -> Result<()> {
        if self.state != State::Closed || self.bound.port == 0 {
            return Err(Error::Illegal);
        }

        self.tuple = FourTuple { local: self.bound, remote: Endpoint::default() };
        self.error = None;
        self.synchronized = false;
        self.reset_buffers();
        self.set_state(State::Listen);
        Ok(())
    }

    /// Close the sending direction, or give up an unfinished open.
    ///
    /// A failed transmission of the FIN is reported but the close proceeds, the FIN is
    /// retransmitted like any segment.
    pub fn close<T: Transmit + ?Sized>(&mut self, now: Instant, tx: &T) -> Result<()> {
        let next = match self.state {
            State::Closed => return Ok(()),
            State::Listen | State::SynSent => {
                self.set_state(State::Closed);
                self.reset_buffers();
                return Ok(());
            },
            State::SynReceived | State::Established => State::FinWait1,
            State::CloseWait => State::LastAck,
            _ => return Err(Error::Illegal),
        };

        self.set_state(next);
        let (send, mut stamp) = self.parts(tx);
        send.enqueue(&[], Flags::FIN | Flags::ACK, now, &mut stamp).map(drop)
    }

    /// Queue data for the peer.
    ///
    /// Fails with `Exhausted` if the send buffer lacks the room for all of `data`. An
    /// `Unreachable` error means the data was queued but could not be sent right away, it must not
    /// be queued again.
    pub fn send<T: Transmit + ?Sized>(&mut self, data: &[u8], now: Instant, tx: &T)
        -> Result<usize>
    {
        if let Some(err) = self.error {
            return Err(err);
        }
        if !self.state.can_send() {
            return Err(Error::Illegal);
        }
        if data.is_empty() {
            return Ok(0);
        }

        let (send, mut stamp) = self.parts(tx);
        send.enqueue(data, Flags::PSH | Flags::ACK, now, &mut stamp)
    }

    /// Take received data without blocking.
    ///
    /// Returns `Some(0)` at the end of the stream and `None` if nothing can be delivered yet.
    /// Fails with `BadSize` if the next segment does not fit into `dest`.
    pub fn receive<T: Transmit + ?Sized>(&mut self, dest: &mut [u8], tx: &T)
        -> Result<Option<usize>>
    {
        if let Some(len) = self.recv.next_len() {
            if len > dest.len() {
                return Err(Error::BadSize);
            }

            let before = self.recv.window_size();
            let copied = self.recv.drain(dest);
            let threshold = self.config.mss.min(self.config.buffer_size / 2).max(1);
            if self.state.receives() && before < threshold && self.recv.window_size() >= threshold {
                self.answer(Flags::ACK, tx);
            }
            return Ok(Some(copied));
        }

        if let Some(err) = self.error {
            return Err(err);
        }
        if self.state == State::Closed || self.recv.is_finished() {
            return Ok(Some(0));
        }
        Ok(None)
    }
}
