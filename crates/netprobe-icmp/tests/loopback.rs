//! Engine tests against real raw sockets.
//!
//! Most of these need CAP_NET_RAW (or root) and are ignored by default:
//! `sudo -E cargo test -p netprobe-icmp -- --ignored`.

use async_trait::async_trait;
use netprobe_core::params::DEFAULT_PING_TTL;
use netprobe_core::{
    HopStatus, MtuParams, PingParams, ProbeContext, ProbeError, Resolver, TraceParams,
};
use netprobe_icmp::{discover_mtu, outcome_error, ping, traceroute};
use netprobe_packets::RawSocketFactory;
use std::net::IpAddr;
use std::sync::Arc;

const LOCALHOST_TARGET: &str = "127.0.0.1";
const TEST_NET_TARGET: &str = "192.0.2.1";

struct LiteralOnly;

#[async_trait]
impl Resolver for LiteralOnly {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ProbeError> {
        Err(ProbeError::HostNotFound { host: host.into() })
    }
}

fn context() -> ProbeContext {
    ProbeContext::new(Arc::new(LiteralOnly), Arc::new(RawSocketFactory))
}

#[tokio::test]
async fn test_test_net_ping_is_never_alive() {
    let ctx = context();
    for _ in 0..2 {
        let (_, outcome) = ping(&ctx, TEST_NET_TARGET, DEFAULT_PING_TTL, &PingParams::default())
            .await
            .expect("ping should not fail for an IP literal");
        assert!(!outcome.alive);
        assert!(outcome.round_trip_ms.is_none());
        assert!(outcome_error(&outcome).is_some());
    }
}

#[tokio::test]
#[ignore] // Requires root privileges
async fn test_localhost_ping() {
    let ctx = context();
    let (target, outcome) = ping(&ctx, LOCALHOST_TARGET, DEFAULT_PING_TTL, &PingParams::default())
        .await
        .unwrap();

    assert_eq!(target.input, LOCALHOST_TARGET);
    assert!(outcome.alive, "loopback should answer: {:?}", outcome);
    assert!(outcome.round_trip_ms.unwrap() >= 0.0);
}

#[tokio::test]
#[ignore] // Requires root privileges
async fn test_localhost_traceroute() {
    let ctx = context();
    let result = traceroute(&ctx, LOCALHOST_TARGET, &TraceParams::default())
        .await
        .unwrap();

    assert!(result.reached_destination);
    assert_eq!(result.total_hops, 1);
    assert_eq!(result.hops[0].status, HopStatus::Reached);
    assert!(result.suspected_destination.is_none());
}

#[tokio::test]
#[ignore] // Requires root privileges
async fn test_localhost_mtu() {
    let ctx = context();
    let result = discover_mtu(&ctx, LOCALHOST_TARGET, &MtuParams::default())
        .await
        .unwrap();

    let mtu = result.discovered_mtu.expect("loopback MTU should be discovered");
    assert!(mtu >= 1500, "loopback MTU {} should be at least 1500", mtu);
    assert!(result.err.is_none());
}
