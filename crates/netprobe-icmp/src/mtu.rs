//! Path MTU discovery with non-fragmentable echo requests.
//!
//! Discovery runs in three phases over a cache of tested sizes:
//!
//! 1. a quick scan of canonical sizes, stopping at the first failure,
//! 2. a binary search strictly between the largest success and the smallest
//!    failure,
//! 3. jumbo probing when the path carries at least 1500 bytes.
//!
//! A validation pass then re-tests the sizes around the result that were
//! never tried. A probe that times out counts as a failure, which cannot be
//! told apart from ordinary packet loss.

use crate::exchange::{probe_once, ExchangeOutcome, PacketShape, ProbeRequest};
use netprobe_core::{
    duration_ms, resolve_target, AddressFamily, MtuParams, MtuResponse, MtuTestResult,
    OperationOutcome, ProbeContext, ProbeError, ProbeErrorKind, ProbeIds, ProbeTarget,
};
use netprobe_packets::min_packet_size;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

const QUICK_SIZES_V4: &[u16] = &[576, 1280, 1460, 1500];
const QUICK_SIZES_V6: &[u16] = &[1280, 1410, 1500];
const JUMBO_SIZES: &[u16] = &[4352, 8192, 9000];
const ETHERNET_MTU: u16 = 1500;

/// Socket error fragments that mean the packet was too large to send.
const MTU_ERROR_FRAGMENTS: &[&str] = &[
    "message too long",
    "packet too big",
    "fragmentation",
    "invalid argument",
];

/// Discovers the largest packet that reaches `host` without fragmentation.
pub async fn discover_mtu(
    ctx: &ProbeContext,
    host: &str,
    params: &MtuParams,
) -> Result<MtuResponse, ProbeError> {
    params.validate()?;
    let target = resolve_target(ctx.resolver.as_ref(), host).await?;
    discover_target_mtu(ctx, &target, params).await
}

/// Discovers the path MTU towards an already resolved target.
pub async fn discover_target_mtu(
    ctx: &ProbeContext,
    target: &ProbeTarget,
    params: &MtuParams,
) -> Result<MtuResponse, ProbeError> {
    params.validate()?;
    let run_id = uuid::Uuid::new_v4().to_string();
    let started = Instant::now();

    let mut discovery = Discovery {
        ctx,
        target,
        params,
        ids: ctx.sequence.next(),
        probes_sent: 0,
        tested: BTreeMap::new(),
    };

    let result = discovery.run().await;
    let outcome = match &result {
        Ok((Some(_), _, _)) => OperationOutcome::Success,
        _ => OperationOutcome::Failure,
    };
    ctx.metrics.record("mtu", outcome, started.elapsed());
    let (discovered, supports_jumbo, validation) = result?;

    info!(
        run_id = %run_id,
        ip = %target.addr,
        mtu = ?discovered,
        supports_jumbo = supports_jumbo,
        probes = discovery.probes_sent,
        "MTU discovery finished"
    );

    let err = match discovered {
        Some(_) => None,
        None => Some(
            ProbeError::Protocol {
                message: format!("no probe size reached {}", target.addr),
            }
            .to_body(),
        ),
    };

    Ok(MtuResponse {
        target_ip: Some(target.addr),
        run_id,
        discovered_mtu: discovered,
        supports_jumbo,
        tests: discovery.tested.into_values().collect(),
        validation,
        err,
    })
}

struct Discovery<'a> {
    ctx: &'a ProbeContext,
    target: &'a ProbeTarget,
    params: &'a MtuParams,
    ids: ProbeIds,
    probes_sent: u16,
    tested: BTreeMap<u16, MtuTestResult>,
}

impl Discovery<'_> {
    async fn run(&mut self) -> Result<(Option<u16>, bool, Vec<MtuTestResult>), ProbeError> {
        let family = self.target.family;
        let floor = min_packet_size(family);

        // Quick scan
        let quick = match family {
            AddressFamily::V4 => QUICK_SIZES_V4,
            AddressFamily::V6 => QUICK_SIZES_V6,
        };
        let mut largest_success = None;
        let mut smallest_failure = None;
        for &size in quick {
            if self.test(size).await? {
                largest_success = Some(size);
            } else {
                smallest_failure = Some(size);
                break;
            }
        }

        // Binary search
        let mut optimal = match smallest_failure {
            None => largest_success,
            Some(failure) => {
                let mut low = largest_success.unwrap_or(floor - 1);
                let mut high = failure;
                while high - low > 1 {
                    let mid = low + (high - low) / 2;
                    if self.test(mid).await? {
                        low = mid;
                    } else {
                        high = mid;
                    }
                }
                (low >= floor).then_some(low)
            }
        };

        // Jumbo frames
        let mut supports_jumbo = false;
        if optimal.is_some_and(|mtu| mtu >= ETHERNET_MTU) {
            for &size in JUMBO_SIZES {
                if !self.test(size).await? {
                    break;
                }
                optimal = Some(size);
                supports_jumbo = true;
            }
        }

        let mut validation = Vec::new();
        if let Some(mtu) = optimal {
            let candidates = [mtu.checked_sub(1), Some(mtu), mtu.checked_add(1)];
            for size in candidates.into_iter().flatten() {
                if size < floor || self.tested.contains_key(&size) {
                    continue;
                }
                let result = self.send(size).await?;
                if size > mtu && result.succeeded {
                    debug!(mtu = mtu, size = size, "Validation found a larger working size");
                    optimal = Some(size);
                }
                validation.push(result);
            }
        }

        Ok((optimal, supports_jumbo, validation))
    }

    /// Returns whether `size` passes, probing only if it was never tried.
    async fn test(&mut self, size: u16) -> Result<bool, ProbeError> {
        if let Some(result) = self.tested.get(&size) {
            return Ok(result.succeeded);
        }
        let result = self.send(size).await?;
        let succeeded = result.succeeded;
        self.tested.insert(size, result);
        Ok(succeeded)
    }

    async fn send(&mut self, size: u16) -> Result<MtuTestResult, ProbeError> {
        if self.probes_sent > 0 && !self.params.inter_probe_delay.is_zero() {
            tokio::time::sleep(self.params.inter_probe_delay).await;
        }

        let request = ProbeRequest {
            target: self.target.addr,
            ids: self.ids.nth(self.probes_sent),
            ttl: None,
            shape: PacketShape::NonFragmentable { total_size: size },
            timeout: self.params.probe_timeout,
        };
        self.probes_sent += 1;

        let outcome = probe_once(self.ctx.transports.as_ref(), &request).await?;
        let result = classify(size, outcome);
        debug!(
            size = size,
            succeeded = result.succeeded,
            error_kind = ?result.error_kind,
            "MTU probe finished"
        );
        Ok(result)
    }
}

fn classify(size: u16, outcome: ExchangeOutcome) -> MtuTestResult {
    let failed = |error_kind| MtuTestResult {
        packet_size: size,
        succeeded: false,
        round_trip_ms: None,
        error_kind,
    };

    match outcome {
        ExchangeOutcome::Replied { rtt } => MtuTestResult {
            packet_size: size,
            succeeded: true,
            round_trip_ms: Some(duration_ms(rtt)),
            error_kind: ProbeErrorKind::None,
        },
        ExchangeOutcome::PacketTooBig { .. } => failed(ProbeErrorKind::PacketTooBig),
        ExchangeOutcome::TimeExceeded { .. } => failed(ProbeErrorKind::TtlExpired),
        ExchangeOutcome::Unreachable { .. } => failed(ProbeErrorKind::Unreachable),
        ExchangeOutcome::TimedOut => failed(ProbeErrorKind::Timeout),
        ExchangeOutcome::SendFailed { message } if is_mtu_error(&message) => {
            failed(ProbeErrorKind::PacketTooBig)
        }
        ExchangeOutcome::SendFailed { .. } => failed(ProbeErrorKind::SendError),
    }
}

/// Returns true if a socket error message means the packet was too large.
pub fn is_mtu_error(message: &str) -> bool {
    let message = message.to_lowercase();
    MTU_ERROR_FRAGMENTS
        .iter()
        .any(|fragment| message.contains(fragment))
}
