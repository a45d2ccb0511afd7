use crate::managed::Sequenced;
use crate::time::Instant;
use crate::wire::{TcpFlags as Flags, TcpSeqNumber as SeqNumber};

/// A range of sequence space held by one of the buffers.
///
/// The payload itself lives in the owning buffer's store, the segment only knows where.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    /// First sequence number occupied, the SYN if one is set.
    pub seq: SeqNumber,
    /// Payload length in bytes.
    pub len: usize,
    /// Control flags sent or received with the segment.
    pub flags: Flags,
    /// Store offset of the first payload byte.
    pub offset: usize,
    /// How often the segment was sent again after its first transmission.
    pub retransmits: u32,
    /// The last time the segment was handed to the device.
    pub sent_at: Option<Instant>,
}

impl Segment {
    /// A segment that has not been sent yet.
    pub fn new(seq: SeqNumber, len: usize, flags: Flags, offset: usize) -> Self {
        Segment {
            seq,
            len,
            flags,
            offset,
            retransmits: 0,
            sent_at: None,
        }
    }

    /// Length in sequence space, SYN and FIN count one each.
    pub fn sequence_len(&self) -> usize {
        self.len + self.flags.sequence_len()
    }

    /// The first sequence number after this segment.
    pub fn end(&self) -> SeqNumber {
        self.seq + self.sequence_len()
    }
}

impl Sequenced for Segment {
    fn seq(&self) -> SeqNumber {
        self.seq
    }
}
