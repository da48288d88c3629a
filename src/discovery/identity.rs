use std::net::{IpAddr, ToSocketAddrs};

use md5::{Digest, Md5};
use uuid::Builder;

use crate::{Error, Result};

/// Resolves an endpoint host name to its management address
#[cfg_attr(test, mockall::automock)]
pub trait AddressResolver: Send + Sync {
    fn resolve(&self, host: &str) -> Result<IpAddr>;
}

/// Literal addresses as-is, everything else through the system resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl AddressResolver for SystemResolver {
    fn resolve(&self, host: &str) -> Result<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }
        (host, 0)
            .to_socket_addrs()?
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| Error::NotFound(format!("no address for host {}", host)))
    }
}

/// Host identity as a name-based (version 3) UUID of the normalized
/// management address.
///
/// The MD5 digest covers the address text alone, with no namespace, so the
/// guid matches the one recorded for the host by earlier management servers
/// and rediscovering a host finds the existing record.
pub fn host_guid(address: &IpAddr) -> String {
    let normalized = address.to_canonical().to_string();
    let digest = Md5::digest(normalized.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    Builder::from_md5_bytes(bytes).into_uuid().to_string()
}
