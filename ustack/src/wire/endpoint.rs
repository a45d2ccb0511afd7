use core::fmt;
use core::str::FromStr;

use super::{Error, Ipv4Address, Result};

/// One end of a connection, an address and a port.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Endpoint {
    /// The IPv4 address.
    pub addr: Ipv4Address,
    /// The TCP port.
    pub port: u16,
}

/// Both ends of a connection, as seen from the local side.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub struct FourTuple {
    /// The local endpoint.
    pub local: Endpoint,
    /// The remote endpoint.
    pub remote: Endpoint,
}

impl Endpoint {
    /// Create an endpoint from its parts.
    pub const fn new(addr: Ipv4Address, port: u16) -> Endpoint {
        Endpoint { addr, port }
    }

    /// Whether the endpoint names a concrete address and port.
    pub fn is_specified(&self) -> bool {
        !self.addr.is_unspecified() && self.port != 0
    }
}

impl From<::std::net::SocketAddrV4> for Endpoint {
    fn from(addr: ::std::net::SocketAddrV4) -> Endpoint {
        Endpoint::new((*addr.ip()).into(), addr.port())
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(src: &str) -> Result<Self> {
        src.parse::<::std::net::SocketAddrV4>()
            .map(Endpoint::from)
            .map_err(|_| Error::Malformed)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

impl fmt::Display for FourTuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} <-> {}", self.local, self.remote)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parse_and_display() {
        let endpoint: Endpoint = "127.0.0.1:40000".parse().unwrap();
        assert_eq!(endpoint, Endpoint::new(Ipv4Address::new(127, 0, 0, 1), 40000));
        assert_eq!(endpoint.to_string(), "127.0.0.1:40000");
        assert!(endpoint.is_specified());
        assert!("127.0.0.1".parse::<Endpoint>().is_err());
    }

    #[test]
    fn lookup_key() {
        let mut bound = HashMap::new();
        bound.insert(Endpoint::new(Ipv4Address::new(10, 0, 0, 1), 80), "a");
        bound.insert(Endpoint::new(Ipv4Address::new(10, 0, 0, 1), 81), "b");
        assert_eq!(bound.get(&"10.0.0.1:81".parse::<Endpoint>().unwrap()), Some(&"b"));
        assert_eq!(bound.get(&"10.0.0.2:80".parse::<Endpoint>().unwrap()), None);
    }
}
