use core::fmt;

use crate::wire::TcpFlags as Flags;

/// The states of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// Not connected, the initial and the final state.
    Closed,
    /// Waiting for a SYN.
    Listen,
    /// Our SYN was sent, waiting for the answer.
    SynSent,
    /// A SYN was received and answered.
    SynReceived,
    /// The handshake completed.
    Established,
    /// Our FIN was sent.
    FinWait1,
    /// Our FIN was acknowledged, waiting for the one of the peer.
    FinWait2,
    /// The peer closed, we may still send.
    CloseWait,
    /// We closed after the peer, waiting for the acknowledgment.
    LastAck,
    /// Both sides closed, lingering to absorb old duplicates.
    TimeWait,
    /// Both sides closed at the same time, waiting for the acknowledgment.
    Closing,
}

impl State {
    /// Every state, in the order of the state diagram.
    pub const ALL: [State; 11] = [
        State::Closed, State::Listen, State::SynSent, State::SynReceived, State::Established,
        State::FinWait1, State::FinWait2, State::CloseWait, State::LastAck, State::TimeWait,
        State::Closing,
    ];

    /// Check a combination of control flags against the state.
    ///
    /// PSH and URG are ignored. A segment with RST is acceptable in every state but Closed, the
    /// caller aborts on it all the same.
    pub fn accepts(self, flags: Flags) -> bool {
        const SYN_ACK: Flags = Flags(Flags::SYN.0 | Flags::ACK.0);
        const FIN_ACK: Flags = Flags(Flags::FIN.0 | Flags::ACK.0);
        const RST_ACK: Flags = Flags(Flags::RST.0 | Flags::ACK.0);

        let flags = flags.without(Flags::PSH | Flags::URG);
        if self == State::Closed {
            return false;
        }
        if flags == Flags::RST || flags == RST_ACK {
            return true;
        }

        match self {
            State::Closed => false,
            State::Listen => flags == Flags::SYN,
            State::SynSent => flags == Flags::SYN || flags == SYN_ACK,
            // SYN|ACK completes a simultaneous open.
            State::SynReceived => flags == Flags::SYN || flags == SYN_ACK || flags == Flags::ACK
                || flags == Flags::FIN || flags == FIN_ACK,
            State::Established => flags == Flags::ACK || flags == FIN_ACK,
            State::FinWait1 => flags == Flags::ACK || flags == FIN_ACK || flags == Flags::FIN,
            State::FinWait2
            | State::CloseWait
            | State::LastAck
            | State::TimeWait
            | State::Closing => flags == Flags::ACK || flags == FIN_ACK,
        }
    }

    /// No receive window exists yet.
    pub fn is_handshake(self) -> bool {
        match self {
            State::Listen | State::SynSent | State::SynReceived => true,
            _ => false,
        }
    }

    /// The application may still queue data.
    pub fn can_send(self) -> bool {
        match self {
            State::Established | State::CloseWait => true,
            _ => false,
        }
    }

    /// Payload and FIN of the peer are still expected.
    pub fn receives(self) -> bool {
        match self {
            State::Established | State::FinWait1 | State::FinWait2 => true,
            _ => false,
        }
    }
}

impl Default for State {
    fn default() -> Self {
        State::Closed
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            State::Closed => "CLOSED",
            State::Listen => "LISTEN",
            State::SynSent => "SYN_SENT",
            State::SynReceived => "SYN_RECEIVED",
            State::Established => "ESTABLISHED",
            State::FinWait1 => "FIN_WAIT_1",
            State::FinWait2 => "FIN_WAIT_2",
            State::CloseWait => "CLOSE_WAIT",
            State::LastAck => "LAST_ACK",
            State::TimeWait => "TIME_WAIT",
            State::Closing => "CLOSING",
        };
        f.write_str(name)
    }
}
