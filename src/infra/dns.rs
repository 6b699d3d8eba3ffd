//! DNS resolution infrastructure.
//!
//! Provides a trait-based abstraction for DNS resolution so hosts can be
//! pinned to fixed addresses (development backends, tests) without touching
//! the executor.

use std::{
    collections::HashMap,
    future::Future,
    net::IpAddr,
    pin::Pin,
};

/// Future returned by [`DnsResolver::resolve`].
pub type ResolveFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<IpAddr>, String>> + Send + 'a>>;

/// Trait for DNS resolution.
pub trait DnsResolver: Send + Sync {
    /// Resolves a hostname to a non-empty list of IP addresses.
    fn resolve<'a>(&'a self, host: &'a str) -> ResolveFuture<'a>;
}

/// Resolver backed by the operating system (`getaddrinfo`).
#[derive(Debug, Default, Clone)]
pub struct SystemDnsResolver;

impl SystemDnsResolver {
    pub fn new() -> Self {
        Self
    }
}

impl DnsResolver for SystemDnsResolver {
    fn resolve<'a>(&'a self, host: &'a str) -> ResolveFuture<'a> {
        Box::pin(async move {
            if let Some(ip) = parse_ip_literal(host) {
                return Ok(vec![ip]);
            }

            let addrs = tokio::net::lookup_host((host, 0))
                .await
                .map_err(|e| format!("{}: {}", host, e))?;

            let mut ips: Vec<IpAddr> = Vec::new();
            for addr in addrs {
                if !ips.contains(&addr.ip()) {
                    ips.push(addr.ip());
                }
            }

            if ips.is_empty() {
                Err(format!("{}: lookup returned no addresses", host))
            } else {
                Ok(ips)
            }
        })
    }
}

/// Resolver that answers fixed hosts from a table and defers everything
/// else to the system resolver.
#[derive(Debug, Default, Clone)]
pub struct OverrideDnsResolver {
    overrides: HashMap<String, IpAddr>,
    fallback: SystemDnsResolver,
}

impl OverrideDnsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins `host` (case-insensitive) to `ip`.
    pub fn with_override(mut self, host: &str, ip: IpAddr) -> Self {
        self.overrides.insert(host.to_ascii_lowercase(), ip);
        self
    }
}

impl DnsResolver for OverrideDnsResolver {
    fn resolve<'a>(&'a self, host: &'a str) -> ResolveFuture<'a> {
        match self.overrides.get(&host.to_ascii_lowercase()) {
            Some(ip) => {
                let ip = *ip;
                Box::pin(async move { Ok(vec![ip]) })
            }
            None => self.fallback.resolve(host),
        }
    }
}

/// Parses an IP literal, accepting the bracketed IPv6 form `url` produces.
fn parse_ip_literal(host: &str) -> Option<IpAddr> {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .ok()
}
