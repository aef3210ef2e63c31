//! Host name resolution for adapters that query by IP address.

use crate::error::{Result, SourceError};
use async_trait::async_trait;
use std::net::IpAddr;

/// Resolves a domain to a single address.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve `domain`, preferring an IPv4 address.
    async fn resolve(&self, domain: &str) -> Result<IpAddr>;
}

/// Resolver backed by the operating system's resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, domain: &str) -> Result<IpAddr> {
        let addrs: Vec<IpAddr> = tokio::net::lookup_host((domain, 0))
            .await
            .map_err(|e| SourceError::Resolution {
                domain: domain.to_string(),
                cause: e.to_string(),
            })?
            .map(|addr| addr.ip())
            .collect();

        addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| SourceError::Resolution {
                domain: domain.to_string(),
                cause: "no addresses found".to_string(),
            })
    }
}

/// Resolver that always answers with the same address.
#[derive(Debug, Clone, Copy)]
pub struct FixedResolver(pub IpAddr);

#[async_trait]
impl HostResolver for FixedResolver {
    async fn resolve(&self, _domain: &str) -> Result<IpAddr> {
        Ok(self.0)
    }
}
