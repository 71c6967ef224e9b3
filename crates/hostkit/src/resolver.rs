//! Name resolution capability.

use crate::command::Cmd;
use crate::error::Result;
use std::net::{IpAddr, ToSocketAddrs};

/// Resolve names and list this host's addresses.
pub trait Resolver: Send + Sync {
    /// Addresses `host` resolves to; empty when the name does not resolve.
    fn resolve(&self, host: &str) -> Result<Vec<IpAddr>>;

    /// Addresses configured on this machine.
    fn local_addresses(&self) -> Result<Vec<IpAddr>>;
}

/// The system resolver plus `hostname -I`.
#[derive(Debug, Default)]
pub struct SystemResolver;

/// Parse the space-separated output of `hostname -I`, skipping anything
/// that is not an address.
pub fn parse_addresses(output: &str) -> Vec<IpAddr> {
    output
        .split_whitespace()
        .filter_map(|a| a.parse().ok())
        .collect()
}

impl Resolver for SystemResolver {
    fn resolve(&self, host: &str) -> Result<Vec<IpAddr>> {
        match (host, 0u16).to_socket_addrs() {
            Ok(addrs) => {
                let mut ips: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
                ips.sort();
                ips.dedup();
                Ok(ips)
            }
            Err(e) => {
                log::debug!("lookup of {host} failed: {e}");
                Ok(Vec::new())
            }
        }
    }

    fn local_addresses(&self) -> Result<Vec<IpAddr>> {
        Ok(parse_addresses(&Cmd::new("hostname").arg("-I").run()?))
    }
}
