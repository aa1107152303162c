//! ICMP echo (ping).

use crate::exchange::{probe_once, ExchangeOutcome, PacketShape, ProbeRequest};
use netprobe_core::params::DEFAULT_PING_TTL;
use netprobe_core::{
    resolve_target, BurstStats, OperationOutcome, PingOutcome, PingParams,
    ProbeContext, ProbeError, ProbeErrorKind, ProbeIds, ProbeTarget, SmokepingResponse,
};
use std::time::Instant;
use tracing::debug;

/// Resolves `host` and sends a single echo request with the given TTL.
///
/// Only resolution and parameter errors are returned as `Err`; everything
/// that happens on the wire, including a missing raw socket privilege, is
/// part of the [`PingOutcome`].
pub async fn ping(
    ctx: &ProbeContext,
    host: &str,
    ttl: u8,
    params: &PingParams,
) -> Result<(ProbeTarget, PingOutcome), ProbeError> {
    params.validate()?;
    let target = resolve_target(ctx.resolver.as_ref(), host).await?;
    let outcome = ping_target(ctx, &target, ttl, ctx.sequence.next(), params).await;
    Ok((target, outcome))
}

/// Sends one echo request to an already resolved target.
pub async fn ping_target(
    ctx: &ProbeContext,
    target: &ProbeTarget,
    ttl: u8,
    ids: ProbeIds,
    params: &PingParams,
) -> PingOutcome {
    let started = Instant::now();
    let request = ProbeRequest {
        target: target.addr,
        ids,
        ttl: Some(ttl),
        shape: PacketShape::Echo {
            payload_size: params.payload_size,
        },
        timeout: params.timeout,
    };

    let outcome = match probe_once(ctx.transports.as_ref(), &request).await {
        Ok(ExchangeOutcome::Replied { rtt }) => PingOutcome::replied(rtt),
        Ok(ExchangeOutcome::TimeExceeded { hop, .. }) => PingOutcome::failed(
            ProbeErrorKind::TtlExpired,
            Some(hop),
            format!("TTL expired in transit at {}", hop),
        ),
        Ok(ExchangeOutcome::Unreachable { hop, code, .. }) => PingOutcome::failed(
            ProbeErrorKind::Unreachable,
            Some(hop),
            format!("destination unreachable (code {}) from {}", code, hop),
        ),
        Ok(ExchangeOutcome::PacketTooBig { hop, .. }) => PingOutcome::failed(
            ProbeErrorKind::PacketTooBig,
            Some(hop),
            format!("packet too big at {}", hop),
        ),
        Ok(ExchangeOutcome::TimedOut) => {
            PingOutcome::failed(ProbeErrorKind::Timeout, None, "request timed out")
        }
        Ok(ExchangeOutcome::SendFailed { message }) => {
            PingOutcome::failed(ProbeErrorKind::SendError, None, message)
        }
        Err(e @ ProbeError::PermissionDenied(_)) => {
            PingOutcome::failed(ProbeErrorKind::PermissionDenied, None, e.to_string())
        }
        Err(e) => PingOutcome::failed(ProbeErrorKind::SendError, None, e.to_string()),
    };

    let result = if outcome.alive {
        OperationOutcome::Success
    } else {
        OperationOutcome::Failure
    };
    ctx.metrics.record("ping", result, started.elapsed());

    debug!(
        ip = %target.addr,
        ttl = ttl,
        alive = outcome.alive,
        error_kind = ?outcome.error_kind,
        "Ping finished"
    );
    outcome
}

/// Returns the error reported alongside a failed ping, or `None` if the
/// target answered.
pub fn outcome_error(outcome: &PingOutcome) -> Option<ProbeError> {
    let message = outcome.message.clone().unwrap_or_default();
    match outcome.error_kind {
        ProbeErrorKind::None => None,
        ProbeErrorKind::Timeout => Some(ProbeError::Timeout),
        ProbeErrorKind::PermissionDenied => Some(ProbeError::PermissionDenied(
            message
                .trim_start_matches(netprobe_core::RAW_SOCKET_PERMISSION_DENIED)
                .trim_start_matches(": ")
                .to_string(),
        )),
        ProbeErrorKind::TtlExpired | ProbeErrorKind::Unreachable | ProbeErrorKind::PacketTooBig => {
            Some(ProbeError::Protocol { message })
        }
        ProbeErrorKind::SendError => Some(ProbeError::SendFailed(std::io::Error::other(message))),
    }
}

/// Sends `count` independent pings to `host`, one after another.
///
/// Each miss is recorded as `-1` in the samples. Loss is data, not an
/// error: `err` is only set when nothing answered and at least one attempt
/// failed for a reason other than a timeout.
pub async fn ping_burst(
    ctx: &ProbeContext,
    host: &str,
    count: usize,
    params: &PingParams,
) -> Result<SmokepingResponse, ProbeError> {
    params.validate()?;
    if count == 0 {
        return Err(ProbeError::InvalidInput("count must be positive".into()));
    }
    let target = resolve_target(ctx.resolver.as_ref(), host).await?;

    let mut samples = Vec::with_capacity(count);
    let mut last_failure = None;
    for i in 0..count {
        if i > 0 && !params.burst_interval.is_zero() {
            tokio::time::sleep(params.burst_interval).await;
        }
        let outcome =
            ping_target(ctx, &target, DEFAULT_PING_TTL, ctx.sequence.next(), params).await;
        match outcome.round_trip_ms {
            Some(ms) if outcome.alive => samples.push(ms),
            _ => {
                samples.push(-1.0);
                if outcome.error_kind != ProbeErrorKind::Timeout {
                    last_failure = outcome_error(&outcome);
                }
            }
        }
    }

    let received = samples.iter().filter(|ms| **ms >= 0.0).count();
    let sent = samples.len();
    let loss_percent = (sent - received) as f64 * 100.0 / sent as f64;
    let err = if received == 0 {
        last_failure.map(|e| e.to_body())
    } else {
        None
    };

    debug!(
        ip = %target.addr,
        sent = sent,
        received = received,
        loss_percent = loss_percent,
        "Ping burst finished"
    );

    Ok(SmokepingResponse {
        target: target.input,
        stats: BurstStats::from_samples(&samples),
        samples,
        sent: sent as u32,
        received: received as u32,
        loss_percent,
        err,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedFactory};
    use async_trait::async_trait;
    use netprobe_core::{Resolver, SequenceCounter};
    use std::net::IpAddr;
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedResolver;

    #[async_trait]
    impl Resolver for FixedResolver {
        async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ProbeError> {
            match host {
                "probe.test" => Ok(vec!["192.0.2.50".parse().unwrap()]),
                _ => Err(ProbeError::HostNotFound { host: host.into() }),
            }
        }
    }

    fn context(factory: ScriptedFactory) -> ProbeContext {
        ProbeContext::new(Arc::new(FixedResolver), Arc::new(factory))
            .with_sequence(Arc::new(SequenceCounter::new(500)))
    }

    fn fast_params() -> PingParams {
        PingParams {
            timeout: Duration::from_millis(20),
            burst_interval: Duration::ZERO,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_ping_replied() {
        let factory = ScriptedFactory::new(|sent| vec![Reply::EchoReply { from: sent.dest }]);
        let ctx = context(factory.clone());

        let (target, outcome) = ping(&ctx, "probe.test", 64, &fast_params()).await.unwrap();
        assert_eq!(target.addr, "192.0.2.50".parse::<IpAddr>().unwrap());
        assert!(outcome.alive);
        assert!(outcome.round_trip_ms.unwrap() >= 0.0);
        assert_eq!(outcome.error_kind, ProbeErrorKind::None);
        assert!(outcome_error(&outcome).is_none());
        assert_eq!(factory.sent()[0].ttl, Some(64));
    }

    #[tokio::test]
    async fn test_ping_test_net_never_alive() {
        let ctx = context(ScriptedFactory::silent());
        for _ in 0..3 {
            let (_, outcome) = ping(&ctx, "192.0.2.1", 128, &fast_params()).await.unwrap();
            assert!(!outcome.alive);
            assert_eq!(outcome.error_kind, ProbeErrorKind::Timeout);
            assert_eq!(outcome_error(&outcome).unwrap().name(), "Timeout");
        }
    }

    #[tokio::test]
    async fn test_ping_time_exceeded_captures_hop() {
        let hop: IpAddr = "10.9.8.7".parse().unwrap();
        let factory = ScriptedFactory::new(move |_| vec![Reply::TimeExceeded { from: hop }]);
        let ctx = context(factory);

        let (_, outcome) = ping(&ctx, "192.0.2.50", 1, &fast_params()).await.unwrap();
        assert!(!outcome.alive);
        assert_eq!(outcome.error_kind, ProbeErrorKind::TtlExpired);
        assert_eq!(outcome.responding_hop_address, Some(hop));
        assert_eq!(outcome_error(&outcome).unwrap().name(), "ProtocolError");
    }

    #[tokio::test]
    async fn test_ping_unreachable() {
        let hop: IpAddr = "10.0.0.254".parse().unwrap();
        let ctx = context(ScriptedFactory::new(move |_| vec![Reply::Unreachable { from: hop }]));

        let (_, outcome) = ping(&ctx, "192.0.2.50", 128, &fast_params()).await.unwrap();
        assert_eq!(outcome.error_kind, ProbeErrorKind::Unreachable);
        assert_eq!(outcome.responding_hop_address, Some(hop));
    }

    #[tokio::test]
    async fn test_ping_permission_denied_message() {
        let ctx = context(ScriptedFactory::denied());

        let (_, outcome) = ping(&ctx, "192.0.2.50", 128, &fast_params()).await.unwrap();
        assert_eq!(outcome.error_kind, ProbeErrorKind::PermissionDenied);
        assert!(outcome
            .message
            .as_deref()
            .unwrap()
            .contains(netprobe_core::RAW_SOCKET_PERMISSION_DENIED));

        let err = outcome_error(&outcome).unwrap();
        assert_eq!(err.name(), "PermissionDenied");
        assert!(err.to_string().contains(netprobe_core::RAW_SOCKET_PERMISSION_DENIED));
    }

    #[tokio::test]
    async fn test_ping_unknown_host() {
        let ctx = context(ScriptedFactory::silent());
        let err = ping(&ctx, "nope.invalid", 128, &fast_params()).await.unwrap_err();
        assert_eq!(err.name(), "HostNotFound");
    }

    #[tokio::test]
    async fn test_each_ping_gets_fresh_ids() {
        let factory = ScriptedFactory::new(|sent| vec![Reply::EchoReply { from: sent.dest }]);
        let ctx = context(factory.clone());

        ping(&ctx, "192.0.2.50", 128, &fast_params()).await.unwrap();
        ping(&ctx, "192.0.2.50", 128, &fast_params()).await.unwrap();

        let sent = factory.sent();
        assert_eq!(sent[0].sequence(), 0);
        assert_eq!(sent[1].sequence(), 1);
    }

    #[tokio::test]
    async fn test_burst_records_misses() {
        let factory = ScriptedFactory::new(|sent| {
            if sent.sequence() % 2 == 0 {
                vec![Reply::EchoReply { from: sent.dest }]
            } else {
                vec![]
            }
        });
        let ctx = context(factory);

        let burst = ping_burst(&ctx, "probe.test", 4, &fast_params()).await.unwrap();
        assert_eq!(burst.sent, 4);
        assert_eq!(burst.received, 2);
        assert_eq!(burst.loss_percent, 50.0);
        assert_eq!(burst.samples[1], -1.0);
        assert_eq!(burst.samples[3], -1.0);
        assert!(burst.stats.is_some());
        assert!(burst.err.is_none());
    }

    #[tokio::test]
    async fn test_burst_without_privilege_reports_error() {
        let ctx = context(ScriptedFactory::denied());

        let burst = ping_burst(&ctx, "192.0.2.50", 2, &fast_params()).await.unwrap();
        assert_eq!(burst.received, 0);
        assert_eq!(burst.loss_percent, 100.0);
        assert!(burst.stats.is_none());
        assert_eq!(burst.err.unwrap().name, "PermissionDenied");
    }
}
