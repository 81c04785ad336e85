use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use crate::error::ConfigError;

pub const DNS_PORT: u16 = 53;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const MAX_QUERY_SIZE: usize = 1024;
pub const MAX_RESPONSE_SIZE: usize = 4096;

/// Where queries go. Not mutated during a resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameserverEndpoint {
    pub address: Ipv4Addr,
    pub port: u16,
}

impl NameserverEndpoint {
    pub fn new(address: Ipv4Addr) -> NameserverEndpoint {
        NameserverEndpoint { address, port: DNS_PORT }
    }

    pub fn with_port(address: Ipv4Addr, port: u16) -> NameserverEndpoint {
        NameserverEndpoint { address, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.address, self.port))
    }
}

impl From<SocketAddrV4> for NameserverEndpoint {
    fn from(addr: SocketAddrV4) -> NameserverEndpoint {
        NameserverEndpoint::with_port(*addr.ip(), addr.port())
    }
}

impl fmt::Display for NameserverEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Everything a resolution attempt needs besides the hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub server: NameserverEndpoint,
    pub timeout: Duration,
    pub max_query_size: usize,
    pub max_response_size: usize,
    pub recursion_desired: bool,
}

impl Default for ResolverConfig {
    fn default() -> ResolverConfig {
        ResolverConfig {
            server: NameserverEndpoint::new(Ipv4Addr::new(8, 8, 8, 8)),
            timeout: DEFAULT_TIMEOUT,
            max_query_size: MAX_QUERY_SIZE,
            max_response_size: MAX_RESPONSE_SIZE,
            recursion_desired: false,
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_query_size == 0 {
            return Err(ConfigError::ZeroBuffer("query"));
        }
        if self.max_response_size == 0 {
            return Err(ConfigError::ZeroBuffer("response"));
        }
        Ok(())
    }
}
