use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use super::ModelError;

/// A CIDR network normalized to its network address (`10.0.0.7/24` becomes
/// `10.0.0.0/24`), so two spellings of the same network compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cidr(IpNetwork);

impl Cidr {
    pub fn new(addr: IpAddr, prefix_len: u8) -> Result<Self, ModelError> {
        let net = IpNetwork::new(addr, prefix_len)
            .map_err(|e| ModelError::InvalidCidr(format!("{}/{}: {}", addr, prefix_len, e)))?;
        Self::normalized(net)
    }

    fn normalized(net: IpNetwork) -> Result<Self, ModelError> {
        IpNetwork::new(net.network(), net.prefix())
            .map(Self)
            .map_err(|e| ModelError::InvalidCidr(format!("{}: {}", net, e)))
    }

    pub fn network(&self) -> IpAddr {
        self.0.network()
    }

    pub fn prefix_len(&self) -> u8 {
        self.0.prefix()
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        self.0.contains(addr)
    }
}

impl FromStr for Cidr {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let net = IpNetwork::from_str(s.trim())
            .map_err(|e| ModelError::InvalidCidr(format!("{}: {}", s, e)))?;
        Self::normalized(net)
    }
}

impl TryFrom<String> for Cidr {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Cidr> for String {
    fn from(value: Cidr) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0.network(), self.0.prefix())
    }
}

impl Ord for Cidr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.network()
            .cmp(&other.network())
            .then(self.prefix_len().cmp(&other.prefix_len()))
    }
}

impl PartialOrd for Cidr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_host_bits() {
        let cidr: Cidr = "10.0.0.7/24".parse().unwrap();
        assert_eq!(cidr.to_string(), "10.0.0.0/24");
        assert_eq!(cidr, "10.0.0.0/24".parse().unwrap());
    }

    #[test]
    fn test_parse_invalid() {
        assert!("not-a-network".parse::<Cidr>().is_err());
        assert!("10.0.0.0/33".parse::<Cidr>().is_err());
    }

    #[test]
    fn test_contains() {
        let cidr: Cidr = "10.1.0.0/16".parse().unwrap();
        assert!(cidr.contains("10.1.200.3".parse().unwrap()));
        assert!(!cidr.contains("10.2.0.1".parse().unwrap()));
        assert!(!cidr.contains("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_ordering_by_network_then_length() {
        let a: Cidr = "10.0.0.0/16".parse().unwrap();
        let b: Cidr = "10.0.0.0/24".parse().unwrap();
        let c: Cidr = "10.0.1.0/24".parse().unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_serde_as_string() {
        let cidr: Cidr = "192.168.1.0/24".parse().unwrap();
        let json = serde_json::to_string(&cidr).unwrap();
        assert_eq!(json, r#""192.168.1.0/24""#);
        let back: Cidr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cidr);
    }
}
