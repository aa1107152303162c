//! DNS resolution with a small in-process cache.

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use netprobe_core::{ProbeError, Resolver};
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

struct CacheEntry {
    addrs: Vec<IpAddr>,
    cached_at: Instant,
}

/// Resolves hostnames through the system resolver configuration and keeps
/// successful answers for `cache_ttl`. A zero TTL disables caching.
pub struct CachingResolver {
    resolver: TokioAsyncResolver,
    cache: RwLock<HashMap<String, CacheEntry>>,
    cache_ttl: Duration,
}

impl CachingResolver {
    pub fn new(cache_ttl: Duration) -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read system DNS configuration, using defaults");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });

        Self {
            resolver,
            cache: RwLock::new(HashMap::new()),
            cache_ttl,
        }
    }

    async fn cached(&self, host: &str) -> Option<Vec<IpAddr>> {
        let cache = self.cache.read().await;
        cache
            .get(host)
            .filter(|entry| entry.cached_at.elapsed() < self.cache_ttl)
            .map(|entry| entry.addrs.clone())
    }
}

#[async_trait]
impl Resolver for CachingResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ProbeError> {
        let key = host.to_ascii_lowercase();
        if let Some(addrs) = self.cached(&key).await {
            debug!(host = host, "DNS cache hit");
            return Ok(addrs);
        }

        let addrs: Vec<IpAddr> = match self.resolver.lookup_ip(host).await {
            Ok(lookup) => lookup.iter().collect(),
            Err(e) => {
                debug!(host = host, error = %e, "DNS lookup failed");
                return Err(ProbeError::HostNotFound { host: host.into() });
            }
        };
        if addrs.is_empty() {
            return Err(ProbeError::HostNotFound { host: host.into() });
        }

        if !self.cache_ttl.is_zero() {
            let mut cache = self.cache.write().await;
            cache.retain(|_, entry| entry.cached_at.elapsed() < self.cache_ttl);
            cache.insert(
                key,
                CacheEntry {
                    addrs: addrs.clone(),
                    cached_at: Instant::now(),
                },
            );
        }

        Ok(addrs)
    }
}
