// src/resolver.rs
use crate::error::{ReconError, Result};
use crate::types::ResolverConfig;
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use trust_dns_resolver::config::{NameServerConfig, Protocol, ResolverConfig as DnsResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Hostname to at most one address.
///
/// `Ok(None)` means the lookup succeeded without usable records; lookup
/// failures come back as `ResolutionError`. Neither is fatal to a run.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, hostname: &str) -> Result<Option<IpAddr>>;
}

pub struct Resolver {
    resolver: TokioAsyncResolver,
    semaphore: Arc<Semaphore>,
}

impl Resolver {
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        let resolver = if config.use_system_resolver {
            TokioAsyncResolver::tokio_from_system_conf()
                .map_err(|e| ReconError::ResolutionError(format!("Failed to create system resolver: {}", e)))?
        } else {
            let mut resolver_config = DnsResolverConfig::new();

            for ns in &config.nameservers {
                let socket_addr = SocketAddr::from_str(ns)
                    .map_err(|e| ReconError::ConfigError(format!("Invalid nameserver address {}: {}", ns, e)))?;
                resolver_config.add_name_server(NameServerConfig {
                    socket_addr,
                    protocol: Protocol::Udp,
                    tls_dns_name: None,
                    trust_negative_responses: false,
                    bind_addr: None,
                });
            }

            let mut opts = ResolverOpts::default();
            opts.timeout = config.timeout;
            opts.attempts = 2;

            TokioAsyncResolver::tokio(resolver_config, opts)
        };

        Ok(Self {
            resolver,
            semaphore: Arc::new(Semaphore::new(config.threads)),
        })
    }
}

#[async_trait]
impl HostResolver for Resolver {
    async fn resolve(&self, hostname: &str) -> Result<Option<IpAddr>> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| ReconError::ResolutionError(format!("Failed to acquire semaphore: {}", e)))?;

        let lookup = self
            .resolver
            .lookup_ip(hostname)
            .await
            .map_err(|e| ReconError::ResolutionError(format!("Failed to resolve {}: {}", hostname, e)))?;

        Ok(pick_address(lookup.iter()))
    }
}

/// Prefers the first IPv4 address, falling back to the first of any family.
pub fn pick_address<I>(addresses: I) -> Option<IpAddr>
where
    I: IntoIterator<Item = IpAddr>,
{
    let mut first = None;
    for address in addresses {
        if address.is_ipv4() {
            return Some(address);
        }
        first.get_or_insert(address);
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_pick_address_prefers_ipv4() {
        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
        let v4 = IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34));
        assert_eq!(pick_address(vec![v6, v4]), Some(v4));
        assert_eq!(pick_address(vec![v6]), Some(v6));
        assert_eq!(pick_address(Vec::new()), None);
    }

    #[test]
    fn test_invalid_nameserver_rejected() {
        let config = ResolverConfig {
            nameservers: vec!["not-an-address".to_string()],
            ..ResolverConfig::default()
        };
        assert!(matches!(Resolver::new(&config), Err(ReconError::ConfigError(_))));
    }
}
