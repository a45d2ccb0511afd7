//! Initial sequence number generation, as recommended by rfc6528.
//!
//! A keyed SipHash-2-4 over the connection's four tuple replaces the MD5 of the secret and tuple
//! that the RFC suggests. The key setup is precomputed once per generator.
use crate::time::Instant;
use crate::wire::{FourTuple, TcpSeqNumber as SeqNumber};

/// An initial sequence number generator based on SipHash-2-4.
///
/// > ISN = M + SipHash-2-4(secretkey, localip, localport, remoteip, remoteport)
///
/// `M` is a clock ticking every 4 microseconds, derived from the millisecond `Instant`. The clock
/// keeps successive incarnations of the same four tuple apart while the hash keeps the sequence
/// space of different tuples unpredictable to an off-path observer.
#[derive(Clone, Copy)]
pub struct IsnGenerator {
    keys: (u64, u64),
}

// Yes, that's the initial values, as ASCII text.
const IV: [&[u8; 8]; 4] = [
    b"somepseu",
    b"dorandom",
    b"lygenera",
    b"tedbytes"];

struct State {
    v0: u64,
    v1: u64,
    v2: u64,
    v3: u64,
}

impl IsnGenerator {
    /// Create a generator by deriving a key from the standard `RandomState`.
    ///
    /// The numbers `0u64` and `1u64` are hashed individually with clones of one hasher from a new
    /// `RandomState`. The two output tags are the key.
    pub fn from_std_hash() -> Self {
        use std::hash::{Hasher, BuildHasher};
        use std::collections::hash_map::RandomState;

        let hash = RandomState::new().build_hasher();
        let tag = |n: u64| {
            let mut hash = hash.clone();
            hash.write_u64(n);
            hash.finish()
        };

        IsnGenerator {
            keys: (tag(0), tag(1)),
        }
    }

    /// Create a generator with some pre-defined secret key.
    pub fn from_secret_key_bytes(bytes: [u8; 16]) -> Self {
        let mut a = [0; 8];
        let mut b = [0; 8];
        a.copy_from_slice(&bytes[..8]);
        b.copy_from_slice(&bytes[8..]);
        IsnGenerator { keys: (u64::from_le_bytes(a), u64::from_le_bytes(b)) }
    }

    /// Get the initial sequence number for a connection.
    pub fn get_isn(&self, connection: FourTuple, time: Instant) -> SeqNumber {
        let mut state = State::init(self.keys.0, self.keys.1);

        let m = u64::from(connection.local.addr.to_network_integer())
            | u64::from(connection.remote.addr.to_network_integer()) << 32;
        let p = u64::from(connection.local.port)
            | u64::from(connection.remote.port) << 16
            // Message length = 12
            | 12_u64 << 56;
        state.absorb(m);
        state.absorb(p);
        let hash = state.finalize() as u32;

        let ticks = (time.total_millis() as u64).wrapping_mul(250) as u32;
        SeqNumber(hash.wrapping_add(ticks))
    }
}

impl core::fmt::Debug for IsnGenerator {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str("IsnGenerator { .. }")
    }
}

impl State {
    const SIP_C: usize = 2;
    const SIP_D: usize = 4;

    fn init(k0: u64, k1: u64) -> Self {
        State {
            v0: u64::from_be_bytes(*IV[0]) ^ k0,
            v1: u64::from_be_bytes(*IV[1]) ^ k1,
            v2: u64::from_be_bytes(*IV[2]) ^ k0,
            v3: u64::from_be_bytes(*IV[3]) ^ k1,
        }
    }

    fn round(&mut self) {
        self.v0 = self.v0.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(13);
        self.v1 ^= self.v0;
        self.v0 = self.v0.rotate_left(32);
        self.v2 = self.v2.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(16);
        self.v3 ^= self.v2;
        self.v0 = self.v0.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(21);
        self.v3 ^= self.v0;
        self.v2 = self.v2.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(17);
        self.v1 ^= self.v2;
        self.v2 = self.v2.rotate_left(32);
    }

    /// Process a single 8-byte block of the message.
    ///
    /// The caller absorbs the length block itself, as the last one.
    fn absorb(&mut self, m: u64) {
        self.v3 ^= m;
        (0..Self::SIP_C).for_each(|_| self.round());
        self.v0 ^= m;
    }

    fn finalize(mut self) -> u64 {
        self.v2 ^= 0xff;
        (0..Self::SIP_D).for_each(|_| self.round());
        self.v0 ^ self.v1 ^ self.v2 ^ self.v3
    }
}
