use core::{ops, cmp, fmt};
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};
use super::ip::{checksum, Protocol};
use super::ipv4::Address;

/// A TCP sequence number.
///
/// A sequence number is a monotonically advancing integer modulo 2<sup>32</sup>. Two sequence
/// numbers are ordered by the sign of their wrapping difference, so there is no discontinuity when
/// comparing pairwise across the wrap. This makes the order non-transitive over the whole space
/// and therefore only `PartialOrd` is implemented.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct SeqNumber(pub u32);

impl SeqNumber {
    /// The signed distance from `other` to `self`.
    pub fn diff(self, other: SeqNumber) -> i32 {
        self.0.wrapping_sub(other.0) as i32
    }

    /// The larger of two sequence numbers, in wrapping order.
    pub fn max(self, other: SeqNumber) -> SeqNumber {
        if self < other { other } else { self }
    }

    /// The smaller of two sequence numbers, in wrapping order.
    pub fn min(self, other: SeqNumber) -> SeqNumber {
        if other < self { other } else { self }
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ops::Add<usize> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: usize) -> SeqNumber {
        if rhs > i32::max_value() as usize {
            panic!("attempt to add to sequence number with unsigned overflow")
        }
        SeqNumber(self.0.wrapping_add(rhs as u32))
    }
}

impl ops::Sub<usize> for SeqNumber {
    type Output = SeqNumber;

    fn sub(self, rhs: usize) -> SeqNumber {
        if rhs > i32::max_value() as usize {
            panic!("attempt to subtract to sequence number with unsigned overflow")
        }
        SeqNumber(self.0.wrapping_sub(rhs as u32))
    }
}

impl ops::AddAssign<usize> for SeqNumber {
    fn add_assign(&mut self, rhs: usize) {
        *self = *self + rhs;
    }
}

impl ops::Sub for SeqNumber {
    type Output = usize;

    fn sub(self, rhs: SeqNumber) -> usize {
        let result = self.diff(rhs);
        if result < 0 {
            panic!("attempt to subtract sequence numbers with underflow")
        }
        result as usize
    }
}

impl cmp::PartialOrd for SeqNumber {
    fn partial_cmp(&self, other: &SeqNumber) -> Option<cmp::Ordering> {
        self.diff(*other).partial_cmp(&0)
    }
}

/// A set of tcp control flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Flags(pub u16);

mod field {
    use crate::wire::field::Field;

    pub(crate) const SRC_PORT: Field = 0..2;
    pub(crate) const DST_PORT: Field = 2..4;
    pub(crate) const SEQ_NUM:  Field = 4..8;
    pub(crate) const ACK_NUM:  Field = 8..12;
    pub(crate) const FLAGS:    Field = 12..14;
    pub(crate) const WIN_SIZE: Field = 14..16;
    pub(crate) const CHECKSUM: Field = 16..18;
    pub(crate) const URGENT:   Field = 18..20;

    pub(crate) const FLG_FIN: u16 = 0x001;
    pub(crate) const FLG_SYN: u16 = 0x002;
    pub(crate) const FLG_RST: u16 = 0x004;
    pub(crate) const FLG_PSH: u16 = 0x008;
    pub(crate) const FLG_ACK: u16 = 0x010;
    pub(crate) const FLG_URG: u16 = 0x020;
}

/// Length of a header without options.
pub const HEADER_LEN: usize = field::URGENT.end;

byte_wrapper! {
    /// A byte sequence representing a TCP segment.
    #[derive(Debug, PartialEq, Eq)]
    pub struct tcp_packet([u8]);
}

impl tcp_packet {
    /// Imbue a raw octet buffer with TCP packet structure.
    pub fn new_unchecked(buffer: &[u8]) -> &tcp_packet {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Imbue a mutable octet buffer with TCP packet structure.
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut tcp_packet {
        Self::__from_macro_new_unchecked_mut(buffer)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&tcp_packet> {
        let packet = Self::new_unchecked(data);
        packet.check_len()?;
        Ok(packet)
    }

    /// View the segment as a raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(Error::Truncated)` if the buffer is too short.
    /// Returns `Err(Error::Malformed)` if the header length field has a value smaller
    /// than the minimal header length.
    pub fn check_len(&self) -> Result<()> {
        let len = self.0.len();
        if len < field::URGENT.end {
            Err(Error::Truncated)
        } else {
            let header_len = self.header_len() as usize;
            if len < header_len {
                Err(Error::Truncated)
            } else if header_len < field::URGENT.end {
                Err(Error::Malformed)
            } else {
                Ok(())
            }
        }
    }

    /// Return the source port field.
    #[inline]
    pub fn src_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::SRC_PORT])
    }

    /// Return the destination port field.
    #[inline]
    pub fn dst_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::DST_PORT])
    }

    /// Return the sequence number field.
    #[inline]
    pub fn seq_number(&self) -> SeqNumber {
        SeqNumber(NetworkEndian::read_u32(&self.0[field::SEQ_NUM]))
    }

    /// Return the acknowledgement number field.
    #[inline]
    pub fn ack_number(&self) -> SeqNumber {
        SeqNumber(NetworkEndian::read_u32(&self.0[field::ACK_NUM]))
    }

    /// Read all control flags at once.
    ///
    /// Only the six classic flags are reported, ECN bits are masked.
    pub fn flags(&self) -> Flags {
        Flags(NetworkEndian::read_u16(&self.0[field::FLAGS]) & 0x3f)
    }

    /// Return the header length, in octets.
    #[inline]
    pub fn header_len(&self) -> u8 {
        let raw = NetworkEndian::read_u16(&self.0[field::FLAGS]);
        ((raw >> 12) * 4) as u8
    }

    /// Return the window size field.
    #[inline]
    pub fn window_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::WIN_SIZE])
    }

    /// Return the checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Return the urgent pointer field.
    #[inline]
    pub fn urgent_at(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::URGENT])
    }

    /// The option bytes between the fixed header and the payload.
    pub fn options(&self) -> &[u8] {
        &self.0[field::URGENT.end..self.header_len() as usize]
    }

    /// The payload following the header.
    pub fn payload_slice(&self) -> &[u8] {
        &self.0[self.header_len() as usize..]
    }

    /// Mutable access to the payload following the header.
    pub fn payload_mut_slice(&mut self) -> &mut [u8] {
        let header_len = self.header_len() as usize;
        &mut self.0[header_len..]
    }

    /// Validate the segment checksum against the IPv4 pseudo header.
    pub fn verify_checksum(&self, src_addr: Address, dst_addr: Address) -> bool {
        checksum::combine(&[
            checksum::pseudo_header(src_addr, dst_addr, Protocol::Tcp, self.0.len() as u16),
            checksum::data(&self.0),
        ]) == !0
    }

    /// Set the source port field.
    #[inline]
    pub fn set_src_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::SRC_PORT], value)
    }

    /// Set the destination port field.
    #[inline]
    pub fn set_dst_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::DST_PORT], value)
    }

    /// Set the sequence number field.
    #[inline]
    pub fn set_seq_number(&mut self, value: SeqNumber) {
        NetworkEndian::write_u32(&mut self.0[field::SEQ_NUM], value.0)
    }

    /// Set the acknowledgement number field.
    #[inline]
    pub fn set_ack_number(&mut self, value: SeqNumber) {
        NetworkEndian::write_u32(&mut self.0[field::ACK_NUM], value.0)
    }

    /// Set the header length, in octets, together with all flags.
    ///
    /// Both share one 16-bit field.
    #[inline]
    pub fn set_header_len_and_flags(&mut self, header_len: u8, Flags(flags): Flags) {
        let raw = (u16::from(header_len) / 4) << 12 | (flags & 0x3f);
        NetworkEndian::write_u16(&mut self.0[field::FLAGS], raw)
    }

    /// Set the window size field.
    #[inline]
    pub fn set_window_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::WIN_SIZE], value)
    }

    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Set the urgent pointer field.
    #[inline]
    pub fn set_urgent_at(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::URGENT], value)
    }

    /// Compute and fill in the checksum over the pseudo header and the whole segment.
    pub fn fill_checksum(&mut self, src_addr: Address, dst_addr: Address) {
        self.set_checksum(0);
        let checksum = !checksum::combine(&[
            checksum::pseudo_header(src_addr, dst_addr, Protocol::Tcp, self.0.len() as u16),
            checksum::data(&self.0),
        ]);
        self.set_checksum(checksum)
    }
}

impl Flags {
    /// No flags.
    pub const NONE: Flags = Flags(0);
    /// The FIN flag.
    pub const FIN: Flags = Flags(field::FLG_FIN);
    /// The SYN flag.
    pub const SYN: Flags = Flags(field::FLG_SYN);
    /// The RST flag.
    pub const RST: Flags = Flags(field::FLG_RST);
    /// The PSH flag.
    pub const PSH: Flags = Flags(field::FLG_PSH);
    /// The ACK flag.
    pub const ACK: Flags = Flags(field::FLG_ACK);
    /// The URG flag.
    pub const URG: Flags = Flags(field::FLG_URG);

    /// Return the FIN flag.
    #[inline]
    pub fn fin(self) -> bool {
        self.0 & field::FLG_FIN != 0
    }

    /// Return the SYN flag.
    #[inline]
    pub fn syn(self) -> bool {
        self.0 & field::FLG_SYN != 0
    }

    /// Return the RST flag.
    #[inline]
    pub fn rst(self) -> bool {
        self.0 & field::FLG_RST != 0
    }

    /// Return the PSH flag.
    #[inline]
    pub fn psh(self) -> bool {
        self.0 & field::FLG_PSH != 0
    }

    /// Return the ACK flag.
    #[inline]
    pub fn ack(self) -> bool {
        self.0 & field::FLG_ACK != 0
    }

    /// Return the URG flag.
    #[inline]
    pub fn urg(self) -> bool {
        self.0 & field::FLG_URG != 0
    }

    /// Check that every flag of `other` is set.
    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// The flags without `other`.
    pub fn without(self, other: Flags) -> Flags {
        Flags(self.0 & !other.0)
    }

    /// Return the length of the control flags, in terms of sequence space.
    ///
    /// SYN and FIN each occupy one sequence number.
    pub fn sequence_len(self) -> usize {
        (if self.syn() { 1 } else { 0 })
        + (if self.fin() { 1 }  else { 0 })
    }
}

impl ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl ops::BitAnd for Flags {
    type Output = Flags;

    fn bitand(self, rhs: Flags) -> Flags {
        Flags(self.0 & rhs.0)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = [
            (Flags::SYN, "SYN"), (Flags::FIN, "FIN"), (Flags::RST, "RST"),
            (Flags::PSH, "PSH"), (Flags::ACK, "ACK"), (Flags::URG, "URG"),
        ];
        let mut first = true;
        for &(flag, name) in names.iter() {
            if self.contains(flag) {
                if !first { f.write_str("|")? }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("-")?;
        }
        Ok(())
    }
}

/// A high-level representation of a TCP header.
///
/// Options are skipped on parsing and never emitted.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// The source port.
    pub src_port:   u16,
    /// The destination port.
    pub dst_port:   u16,
    /// All control flags, including ACK.
    pub flags:      Flags,
    /// The sequence number of the first octet in sequence space.
    pub seq_number: SeqNumber,
    /// The acknowledgment number, only meaningful with the ACK flag.
    pub ack_number: SeqNumber,
    /// The advertised receive window.
    pub window_len: u16,
    /// Number of payload octets following the header.
    pub payload_len: u16,
}

impl Repr {
    /// Parse a TCP segment, validating its checksum against the IPv4 pseudo header.
    pub fn parse(packet: &tcp_packet, src_addr: Address, dst_addr: Address) -> Result<Repr> {
        packet.check_len()?;
        // Source and destination ports must be present.
        if packet.src_port() == 0 { return Err(Error::Malformed) }
        if packet.dst_port() == 0 { return Err(Error::Malformed) }
        if !packet.verify_checksum(src_addr, dst_addr) {
            return Err(Error::WrongChecksum)
        }

        // The URG flag and the urgent field are ignored, as are all options.
        Ok(Repr {
            src_port:    packet.src_port(),
            dst_port:    packet.dst_port(),
            flags:       packet.flags(),
            seq_number:  packet.seq_number(),
            ack_number:  packet.ack_number(),
            window_len:  packet.window_len(),
            payload_len: packet.payload_slice().len() as u16,
        })
    }

    /// Return the length of the header that will be emitted.
    pub fn header_len(&self) -> usize {
        HEADER_LEN
    }

    /// Return the length of a segment that will be emitted from this high-level representation.
    pub fn buffer_len(&self) -> usize {
        self.header_len() + usize::from(self.payload_len)
    }

    /// Emit the header into a segment buffer.
    ///
    /// The checksum is left zeroed, fill it with [`tcp_packet::fill_checksum`] once the payload
    /// has been written.
    ///
    /// [`tcp_packet::fill_checksum`]: struct.tcp_packet.html#method.fill_checksum
    pub fn emit(&self, packet: &mut tcp_packet) {
        packet.set_src_port(self.src_port);
        packet.set_dst_port(self.dst_port);
        packet.set_seq_number(self.seq_number);
        let ack = if self.flags.ack() { self.ack_number } else { SeqNumber(0) };
        packet.set_ack_number(ack);
        packet.set_header_len_and_flags(HEADER_LEN as u8, self.flags);
        packet.set_window_len(self.window_len);
        packet.set_checksum(0);
        packet.set_urgent_at(0);
    }

    /// Return the length of the segment, in terms of sequence space.
    pub fn sequence_len(&self) -> usize {
        usize::from(self.payload_len) + self.flags.sequence_len()
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TCP src={} dst={} [{}] seq={}",
               self.src_port, self.dst_port, self.flags, self.seq_number)?;
        if self.flags.ack() {
            write!(f, " ack={}", self.ack_number)?;
        }
        write!(f, " win={} len={}", self.window_len, self.payload_len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SRC_ADDR: Address = Address([192, 168, 1, 1]);
    const DST_ADDR: Address = Address([192, 168, 1, 2]);

    static PACKET_BYTES: [u8; 28] =
        [0xbf, 0x00, 0x00, 0x50,
         0x01, 0x23, 0x45, 0x67,
         0x89, 0xab, 0xcd, 0xef,
         0x60, 0x35, 0x01, 0x23,
         0x01, 0xb6, 0x02, 0x01,
         0x03, 0x03, 0x0c, 0x01,
         0xaa, 0x00, 0x00, 0xff];

    static SYN_PACKET_BYTES: [u8; 24] =
        [0xbf, 0x00, 0x00, 0x50,
         0x01, 0x23, 0x45, 0x67,
         0x00, 0x00, 0x00, 0x00,
         0x50, 0x02, 0x01, 0x23,
         0x7a, 0x8d, 0x00, 0x00,
         0xaa, 0x00, 0x00, 0xff];

    static PAYLOAD_BYTES: [u8; 4] =
        [0xaa, 0x00, 0x00, 0xff];

    fn syn_repr() -> Repr {
        Repr {
            src_port:    48896,
            dst_port:    80,
            flags:       Flags::SYN,
            seq_number:  SeqNumber(0x01234567),
            ack_number:  SeqNumber(0),
            window_len:  0x0123,
            payload_len: PAYLOAD_BYTES.len() as u16,
        }
    }

    #[test]
    fn deconstruct() {
        let packet = tcp_packet::new_checked(&PACKET_BYTES[..]).unwrap();
        assert_eq!(packet.src_port(), 48896);
        assert_eq!(packet.dst_port(), 80);
        assert_eq!(packet.seq_number(), SeqNumber(0x01234567));
        assert_eq!(packet.ack_number(), SeqNumber(0x89abcdef));
        assert_eq!(packet.header_len(), 24);
        assert_eq!(packet.flags(), Flags::FIN | Flags::RST | Flags::ACK | Flags::URG);
        assert_eq!(packet.window_len(), 0x0123);
        assert_eq!(packet.urgent_at(), 0x0201);
        assert_eq!(packet.checksum(), 0x01b6);
        assert_eq!(packet.options(), &[0x03, 0x03, 0x0c, 0x01]);
        assert_eq!(packet.payload_slice(), &PAYLOAD_BYTES[..]);
        assert!(packet.verify_checksum(SRC_ADDR, DST_ADDR));
        assert!(!packet.verify_checksum(DST_ADDR, DST_ADDR));
    }

    #[test]
    fn parse_skips_options() {
        let packet = tcp_packet::new_checked(&PACKET_BYTES[..]).unwrap();
        let repr = Repr::parse(packet, SRC_ADDR, DST_ADDR).unwrap();
        assert_eq!(repr.payload_len, 4);
        assert_eq!(repr.sequence_len(), 5);
    }

    #[test]
    fn parse() {
        let packet = tcp_packet::new_checked(&SYN_PACKET_BYTES[..]).unwrap();
        assert_eq!(Repr::parse(packet, SRC_ADDR, DST_ADDR), Ok(syn_repr()));
    }

    #[test]
    fn emit() {
        let repr = syn_repr();
        let mut bytes = vec![0xa5; repr.buffer_len()];
        let packet = tcp_packet::new_unchecked_mut(&mut bytes);
        repr.emit(packet);
        packet.payload_mut_slice().copy_from_slice(&PAYLOAD_BYTES);
        packet.fill_checksum(SRC_ADDR, DST_ADDR);
        assert_eq!(&bytes[..], &SYN_PACKET_BYTES[..]);
    }

    #[test]
    fn truncated() {
        assert_eq!(tcp_packet::new_checked(&PACKET_BYTES[..19]), Err(Error::Truncated));
        assert_eq!(tcp_packet::new_checked(&PACKET_BYTES[..23]), Err(Error::Truncated));
    }

    #[test]
    fn impossible_len() {
        let mut bytes = vec![0; 20];
        tcp_packet::new_unchecked_mut(&mut bytes).set_header_len_and_flags(12, Flags::NONE);
        assert_eq!(tcp_packet::new_checked(&bytes), Err(Error::Malformed));
    }

    #[test]
    fn wrong_checksum() {
        let mut bytes = SYN_PACKET_BYTES;
        bytes[21] = 0x01;
        let packet = tcp_packet::new_checked(&bytes[..]).unwrap();
        assert_eq!(Repr::parse(packet, SRC_ADDR, DST_ADDR), Err(Error::WrongChecksum));
    }

    #[test]
    fn seq_wrap_compare() {
        let a = SeqNumber(0xffff_fff0);
        let b = SeqNumber(10);
        assert!(a < b);
        assert!(b > a);
        assert!(a <= a);
        assert_eq!(b - a, 26);
        assert_eq!(a + 26, b);
        assert_eq!(b - 26usize, a);
        assert_eq!(a.max(b), b);
        assert_eq!(a.min(b), a);
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn seq_negative_distance() {
        let _ = SeqNumber(10) - SeqNumber(11);
    }

    #[test]
    fn flags_display() {
        assert_eq!((Flags::SYN | Flags::ACK).to_string(), "SYN|ACK");
        assert_eq!(Flags::NONE.to_string(), "-");
        assert_eq!((Flags::FIN | Flags::SYN).sequence_len(), 2);
    }

    mod properties {
        use super::super::SeqNumber;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn order_matches_signed_difference(a: u32, b: u32) {
                let (sa, sb) = (SeqNumber(a), SeqNumber(b));
                let diff = a.wrapping_sub(b) as i32;
                prop_assert_eq!(sa < sb, diff < 0);
                prop_assert_eq!(sa > sb, diff > 0);
                prop_assert_eq!(sa == sb, diff == 0);
            }

            #[test]
            fn add_then_distance(a: u32, step in 0usize..(1 << 31)) {
                let start = SeqNumber(a);
                let end = start + step;
                prop_assert_eq!(end - start, step);
                prop_assert!(start <= end);
            }
        }
    }
}
