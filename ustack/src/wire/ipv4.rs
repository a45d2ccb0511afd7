use core::fmt;
use core::str::FromStr;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};
use super::ip::{checksum, Protocol};

/// A four-octet IPv4 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 4]);

impl Address {
    /// An unspecified address.
    pub const UNSPECIFIED: Address = Address([0x00; 4]);

    /// Construct an IPv4 address from parts.
    pub const fn new(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address([a0, a1, a2, a3])
    }

    /// Construct an IPv4 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not four octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Return an IPv4 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encode the address into a `u32` in network endian byte order.
    pub fn to_network_integer(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Query whether the address falls into the "unspecified" range.
    pub fn is_unspecified(&self) -> bool {
        self.0[0] == 0
    }
}

impl From<::std::net::Ipv4Addr> for Address {
    fn from(x: ::std::net::Ipv4Addr) -> Address {
        Address(x.octets())
    }
}

impl From<Address> for ::std::net::Ipv4Addr {
    fn from(Address(x): Address) -> ::std::net::Ipv4Addr {
        x.into()
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(src: &str) -> Result<Self> {
        src.parse::<::std::net::Ipv4Addr>()
            .map(Address::from)
            .map_err(|_| Error::Malformed)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{}.{}.{}.{}", bytes[0], bytes[1], bytes[2], bytes[3])
    }
}

byte_wrapper! {
    /// A byte sequence representing an IPv4 packet.
    #[derive(Debug, PartialEq, Eq)]
    pub struct ipv4([u8]);
}

mod field {
    use crate::wire::field::Field;

    pub(crate) const VER_IHL:  usize = 0;
    pub(crate) const DSCP_ECN: usize = 1;
    pub(crate) const LENGTH:   Field = 2..4;
    pub(crate) const IDENT:    Field = 4..6;
    pub(crate) const FLG_OFF:  Field = 6..8;
    pub(crate) const TTL:      usize = 8;
    pub(crate) const PROTOCOL: usize = 9;
    pub(crate) const CHECKSUM: Field = 10..12;
    pub(crate) const SRC_ADDR: Field = 12..16;
    pub(crate) const DST_ADDR: Field = 16..20;
}

/// Length of a header without options.
pub const HEADER_LEN: usize = field::DST_ADDR.end;

impl ipv4 {
    /// Imbue a raw octet buffer with IPv4 packet structure.
    pub fn new_unchecked(buffer: &[u8]) -> &ipv4 {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Imbue a mutable octet buffer with IPv4 packet structure.
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut ipv4 {
        Self::__from_macro_new_unchecked_mut(buffer)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&ipv4> {
        let packet = Self::new_unchecked(data);
        packet.check_len()?;
        Ok(packet)
    }

    /// View the packet as a raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(Error::Truncated)` if the buffer is too short.
    /// Returns `Err(Error::Malformed)` if the header length is greater
    /// than total length.
    pub fn check_len(&self) -> Result<()> {
        let len = self.0.len();
        if len < field::DST_ADDR.end {
            Err(Error::Truncated)
        } else if len < self.header_len() as usize {
            Err(Error::Truncated)
        } else if (self.header_len() as u16) < HEADER_LEN as u16 {
            Err(Error::Malformed)
        } else if self.header_len() as u16 > self.total_len() {
            Err(Error::Malformed)
        } else if len < self.total_len() as usize {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the version field.
    #[inline]
    pub fn version(&self) -> u8 {
        self.0[field::VER_IHL] >> 4
    }

    /// Return the header length, in octets.
    #[inline]
    pub fn header_len(&self) -> u8 {
        (self.0[field::VER_IHL] & 0x0f) * 4
    }

    /// Return the total length field.
    #[inline]
    pub fn total_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::LENGTH])
    }

    /// Return the "more fragments" flag.
    #[inline]
    pub fn more_frags(&self) -> bool {
        NetworkEndian::read_u16(&self.0[field::FLG_OFF]) & 0x2000 != 0
    }

    /// Return the fragment offset, in octets.
    #[inline]
    pub fn frag_offset(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::FLG_OFF]) << 3
    }

    /// Return the time to live field.
    #[inline]
    pub fn hop_limit(&self) -> u8 {
        self.0[field::TTL]
    }

    /// Return the protocol field.
    #[inline]
    pub fn protocol(&self) -> Protocol {
        Protocol::from(self.0[field::PROTOCOL])
    }

    /// Return the source address field.
    #[inline]
    pub fn src_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::SRC_ADDR])
    }

    /// Return the destination address field.
    #[inline]
    pub fn dst_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::DST_ADDR])
    }

    /// Validate the header checksum.
    pub fn verify_checksum(&self) -> bool {
        checksum::data(&self.0[..self.header_len() as usize]) == !0
    }

    /// Return the payload, bounded by the total length field.
    pub fn payload_slice(&self) -> &[u8] {
        let range = self.header_len() as usize..self.total_len() as usize;
        &self.0[range]
    }

    fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let checksum = !checksum::data(&self.0[..self.header_len() as usize]);
        self.set_checksum(checksum)
    }
}

/// High-level representation of an IPv4 header without options.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// The source address.
    pub src_addr: Address,
    /// The destination address.
    pub dst_addr: Address,
    /// The encapsulated protocol.
    pub protocol: Protocol,
    /// Length of the encapsulated payload.
    pub payload_len: usize,
    /// The time to live.
    pub hop_limit: u8,
}

impl Repr {
    /// Parse an Internet Protocol version 4 packet and return a high-level representation.
    pub fn parse(packet: &ipv4) -> Result<Repr> {
        packet.check_len()?;
        if packet.version() != 4 { return Err(Error::Unrecognized) }
        if !packet.verify_checksum() { return Err(Error::WrongChecksum) }
        // We do not support fragmentation.
        if packet.more_frags() || packet.frag_offset() != 0 { return Err(Error::Unsupported) }

        Ok(Repr {
            src_addr:    packet.src_addr(),
            dst_addr:    packet.dst_addr(),
            protocol:    packet.protocol(),
            payload_len: packet.total_len() as usize - packet.header_len() as usize,
            hop_limit:   packet.hop_limit(),
        })
    }

    /// Return the length of a header that will be emitted from this high-level representation.
    pub fn buffer_len(&self) -> usize {
        HEADER_LEN
    }

    /// Emit a high-level representation into the header of an IPv4 packet.
    ///
    /// # Panics
    /// This function panics if the buffer is shorter than the header.
    pub fn emit(&self, packet: &mut ipv4) {
        let bytes = &mut packet.0;
        bytes[field::VER_IHL] = 0x40 | (HEADER_LEN / 4) as u8;
        bytes[field::DSCP_ECN] = 0;
        NetworkEndian::write_u16(&mut bytes[field::LENGTH], (HEADER_LEN + self.payload_len) as u16);
        NetworkEndian::write_u16(&mut bytes[field::IDENT], 0);
        // Don't fragment, no offset.
        NetworkEndian::write_u16(&mut bytes[field::FLG_OFF], 0x4000);
        bytes[field::TTL] = self.hop_limit;
        bytes[field::PROTOCOL] = self.protocol.into();
        bytes[field::SRC_ADDR].copy_from_slice(self.src_addr.as_bytes());
        bytes[field::DST_ADDR].copy_from_slice(self.dst_addr.as_bytes());
        packet.fill_checksum();
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IPv4 src={} dst={} proto={}",
               self.src_addr, self.dst_addr, self.protocol)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static PACKET_BYTES: [u8; 24] = [
        0x45, 0x00, 0x00, 0x18,
        0x00, 0x00, 0x40, 0x00,
        0x40, 0x06, 0x00, 0x00,
        0x0a, 0x00, 0x00, 0x01,
        0x0a, 0x00, 0x00, 0x02,
        0xaa, 0x00, 0x00, 0xff,
    ];

    fn repr() -> Repr {
        Repr {
            src_addr: Address([10, 0, 0, 1]),
            dst_addr: Address([10, 0, 0, 2]),
            protocol: Protocol::Tcp,
            payload_len: 4,
            hop_limit: 64,
        }
    }

    #[test]
    fn emit_then_parse() {
        let mut bytes = PACKET_BYTES;
        repr().emit(ipv4::new_unchecked_mut(&mut bytes));
        assert_eq!(&bytes[..10], &PACKET_BYTES[..10]);

        let packet = ipv4::new_checked(&bytes).unwrap();
        assert!(packet.verify_checksum());
        assert_eq!(Repr::parse(packet), Ok(repr()));
        assert_eq!(packet.payload_slice(), &[0xaa, 0x00, 0x00, 0xff]);
    }

    #[test]
    fn bad_checksum() {
        let mut bytes = PACKET_BYTES;
        repr().emit(ipv4::new_unchecked_mut(&mut bytes));
        bytes[field::TTL] = 1;
        assert_eq!(Repr::parse(ipv4::new_unchecked(&bytes)), Err(Error::WrongChecksum));
    }

    #[test]
    fn truncated() {
        assert_eq!(ipv4::new_checked(&PACKET_BYTES[..12]), Err(Error::Truncated));
        assert_eq!(ipv4::new_checked(&PACKET_BYTES[..22]), Err(Error::Truncated));
    }

    #[test]
    fn fragments_unsupported() {
        let mut bytes = PACKET_BYTES;
        repr().emit(ipv4::new_unchecked_mut(&mut bytes));
        bytes[6] = 0x20;
        ipv4::new_unchecked_mut(&mut bytes).fill_checksum();
        assert_eq!(Repr::parse(ipv4::new_unchecked(&bytes)), Err(Error::Unsupported));
    }

    #[test]
    fn address_text() {
        let addr: Address = "127.0.0.1".parse().unwrap();
        assert_eq!(addr, Address::new(127, 0, 0, 1));
        assert_eq!(addr.to_string(), "127.0.0.1");
        assert!("127.0.0".parse::<Address>().is_err());
    }
}
