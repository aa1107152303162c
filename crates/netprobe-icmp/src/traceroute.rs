//! Serial ICMP traceroute.
//!
//! Sends one echo at a time with an increasing hop limit and waits for an
//! answer (or timeout) before moving on to the next TTL.

use crate::exchange::{probe_once, ExchangeOutcome, PacketShape, ProbeRequest};
use netprobe_core::{
    duration_ms, resolve_target, HopRecord, HopStatus, OperationOutcome, ProbeContext,
    ProbeError, ProbeTarget, SuspectedDestination, TraceParams, TraceResponse,
};
use std::net::IpAddr;
use std::time::Instant;
use tracing::{debug, info};

/// Traces the path to `host`.
pub async fn traceroute(
    ctx: &ProbeContext,
    host: &str,
    params: &TraceParams,
) -> Result<TraceResponse, ProbeError> {
    params.validate()?;
    let target = resolve_target(ctx.resolver.as_ref(), host).await?;
    trace_target(ctx, &target, params).await
}

/// Traces the path to an already resolved target.
pub async fn trace_target(
    ctx: &ProbeContext,
    target: &ProbeTarget,
    params: &TraceParams,
) -> Result<TraceResponse, ProbeError> {
    params.validate()?;
    let ids = ctx.sequence.next();
    let run_id = uuid::Uuid::new_v4().to_string();
    let started = Instant::now();

    let mut hops = Vec::with_capacity(params.max_hops as usize);
    let mut reached = false;
    let mut consecutive_timeouts = 0u8;

    for ttl in 1..=params.max_hops {
        let request = ProbeRequest {
            target: target.addr,
            ids: ids.nth(ttl as u16),
            ttl: Some(ttl),
            shape: PacketShape::Echo {
                payload_size: params.payload_size,
            },
            timeout: params.timeout,
        };

        debug!(run_id = %run_id, ttl = ttl, "Sending probe");
        let outcome = match probe_once(ctx.transports.as_ref(), &request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(run_id = %run_id, ttl = ttl, error = %e, "Fatal error during probe");
                ctx.metrics
                    .record("traceroute", OperationOutcome::Failure, started.elapsed());
                return Err(e);
            }
        };

        let (hop, stop) = hop_from_outcome(ttl, target.addr, outcome);
        if hop.status == HopStatus::Timeout {
            consecutive_timeouts += 1;
        } else {
            consecutive_timeouts = 0;
        }

        debug!(
            ttl = ttl,
            ip = ?hop.responding_address,
            rtt_ms = ?hop.round_trip_ms,
            status = ?hop.status,
            "Hop finished"
        );
        reached = hop.status == HopStatus::Reached;
        hops.push(hop);

        if stop {
            break;
        }
        if consecutive_timeouts >= params.max_consecutive_timeouts {
            debug!(ttl = ttl, consecutive_timeouts = consecutive_timeouts, "Too many silent hops, aborting");
            break;
        }
    }

    let suspected_destination = if reached {
        None
    } else {
        suspect_destination(&hops, params.suspect_after_timeouts)
    };

    let result = if reached {
        OperationOutcome::Success
    } else {
        OperationOutcome::Failure
    };
    ctx.metrics.record("traceroute", result, started.elapsed());

    info!(
        run_id = %run_id,
        ip = %target.addr,
        hops = hops.len(),
        reached = reached,
        "Traceroute finished"
    );

    Ok(TraceResponse {
        target_ip: Some(target.addr),
        run_id,
        total_hops: hops.len(),
        reached_destination: reached,
        hops,
        suspected_destination,
        err: None,
    })
}

/// Converts one exchange into a hop record; the flag says whether the run
/// stops here.
fn hop_from_outcome(ttl: u8, target: IpAddr, outcome: ExchangeOutcome) -> (HopRecord, bool) {
    let hop = |address, rtt: Option<std::time::Duration>, status| HopRecord {
        hop_number: ttl,
        responding_address: address,
        round_trip_ms: rtt.map(duration_ms),
        status,
    };

    match outcome {
        ExchangeOutcome::Replied { rtt } => (hop(Some(target), Some(rtt), HopStatus::Reached), true),
        ExchangeOutcome::TimeExceeded { hop: addr, rtt } => {
            (hop(Some(addr), Some(rtt), HopStatus::Intermediate), false)
        }
        ExchangeOutcome::Unreachable { hop: addr, rtt, .. } => {
            (hop(Some(addr), Some(rtt), HopStatus::Error), true)
        }
        ExchangeOutcome::PacketTooBig { hop: addr, .. } => {
            (hop(Some(addr), None, HopStatus::Error), false)
        }
        ExchangeOutcome::TimedOut => (hop(None, None, HopStatus::Timeout), false),
        ExchangeOutcome::SendFailed { .. } => (hop(None, None, HopStatus::Error), false),
    }
}

/// Flags the last responding hop when at least `min_trailing` hops after it
/// all timed out.
fn suspect_destination(hops: &[HopRecord], min_trailing: u8) -> Option<SuspectedDestination> {
    let trailing = hops
        .iter()
        .rev()
        .take_while(|hop| hop.status == HopStatus::Timeout)
        .count();
    if trailing < min_trailing as usize || trailing == hops.len() {
        return None;
    }

    let last = &hops[hops.len() - trailing - 1];
    let address = last.responding_address?;
    Some(SuspectedDestination {
        hop_number: last.hop_number,
        address,
        round_trip_ms: last.round_trip_ms,
    })
}
