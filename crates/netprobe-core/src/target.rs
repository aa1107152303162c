//! Turning request hosts into probe targets.

use crate::{ProbeError, ProbeTarget, Resolver};
use rand::seq::SliceRandom;
use std::net::IpAddr;
use tracing::debug;

/// Resolves `host` into a single probe target.
///
/// IP literals are used as-is. Hostnames go through `resolver` and one of the
/// returned addresses is picked uniformly at random; the others are not
/// retried.
pub async fn resolve_target(resolver: &dyn Resolver, host: &str) -> Result<ProbeTarget, ProbeError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(ProbeError::InvalidInput("host must not be empty".into()));
    }

    if let Ok(addr) = host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        return Ok(ProbeTarget::new(addr, host));
    }

    let candidates = resolver.resolve(host).await?;
    let addr = candidates
        .choose(&mut rand::thread_rng())
        .copied()
        .ok_or_else(|| ProbeError::HostNotFound {
            host: host.to_string(),
        })?;

    debug!(host = host, ip = %addr, candidates = candidates.len(), "Resolved target");
    Ok(ProbeTarget::new(addr, host))
}
