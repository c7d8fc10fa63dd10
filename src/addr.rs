//! Endpoint descriptions of a hijacked connection.
//!
//! The plugin never resolves these; they are the strings the host reported
//! for its own socket, handed back unchanged.

use std::fmt;

/// Anything that describes a network endpoint.
pub trait NetAddr: fmt::Display {
    /// Network kind, e.g. `"tcp"` or `"unix"`.
    fn network(&self) -> &str;

    /// Address in the network's own notation, e.g. `"127.0.0.1:8080"`.
    fn address(&self) -> &str;
}

/// Immutable `(network, address)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Addr {
    network: String,
    address: String,
}

impl Addr {
    pub fn new(network: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            address: address.into(),
        }
    }
}

impl NetAddr for Addr {
    #[inline]
    fn network(&self) -> &str {
        &self.network
    }

    #[inline]
    fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addr_returns_constructed_strings() {
        let addr = Addr::new("tcp", "127.0.0.1:9");
        assert_eq!(addr.network(), "tcp");
        assert_eq!(addr.address(), "127.0.0.1:9");
        assert_eq!(addr.to_string(), "127.0.0.1:9");
    }

    #[test]
    fn test_addr_is_not_parsed() {
        let addr = Addr::new("unix", "not a socket address");
        assert_eq!(addr.address(), "not a socket address");

        let empty = Addr::new("", "");
        assert_eq!(empty.network(), "");
        assert_eq!(empty.to_string(), "");
    }

    #[test]
    fn test_dyn_net_addr() {
        let addr: Box<dyn NetAddr> = Box::new(Addr::new("tcp", "10.0.0.1:9"));
        assert_eq!(addr.network(), "tcp");
        assert_eq!(format!("{addr}"), "10.0.0.1:9");
    }
}
