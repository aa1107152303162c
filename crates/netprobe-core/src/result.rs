//! Response bodies returned by the probe server.
//!
//! Every body is serialized with camelCase keys and carries an `err` field
//! that is `null` on success. Failures keep the same shape so collectors can
//! tell "probe ran and found nothing" apart from "probe infrastructure failed"
//! without looking at the HTTP status.

use crate::{ErrorBody, HopRecord, MtuTestResult, PortScanResult, ProbeError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::IpAddr;
use std::time::Instant;

/// Wraps a body with the timing fields every response carries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    #[serde(flatten)]
    pub body: T,
    pub timestamp: DateTime<Utc>,
    pub response_time_ms: f64,
}

impl<T> Envelope<T> {
    /// Stamps `body` with the current time and the elapsed time since `started`.
    pub fn finish(body: T, started: Instant) -> Self {
        Self {
            body,
            timestamp: Utc::now(),
            response_time_ms: crate::duration_ms(started.elapsed()),
        }
    }
}

/// Body of a single ping.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    pub target: String,
    pub ms: Option<f64>,
    pub ttl: u8,
    pub err: Option<ErrorBody>,
}

/// Latency statistics over the answered samples of a burst.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurstStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    /// Mean absolute difference between consecutive answered samples.
    pub jitter: f64,
}

impl BurstStats {
    /// Computes statistics over the answered samples; `None` if nothing answered.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        let answered: Vec<f64> = samples.iter().copied().filter(|ms| *ms >= 0.0).collect();
        if answered.is_empty() {
            return None;
        }

        let min = answered.iter().copied().fold(f64::INFINITY, f64::min);
        let max = answered.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = answered.iter().sum::<f64>() / answered.len() as f64;
        let jitter = if answered.len() > 1 {
            let total: f64 = answered.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
            total / (answered.len() - 1) as f64
        } else {
            0.0
        };

        Some(Self { min, avg, max, jitter })
    }
}

/// Body of a ping burst. Misses are recorded as `-1` in `samples`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmokepingResponse {
    pub target: String,
    pub samples: Vec<f64>,
    pub sent: u32,
    pub received: u32,
    pub loss_percent: f64,
    pub stats: Option<BurstStats>,
    pub err: Option<ErrorBody>,
}

impl SmokepingResponse {
    pub fn failed(target: impl Into<String>, err: &ProbeError) -> Self {
        Self {
            target: target.into(),
            samples: Vec::new(),
            sent: 0,
            received: 0,
            loss_percent: 100.0,
            stats: None,
            err: Some(err.to_body()),
        }
    }
}

/// Last responding hop of a run that never reached its destination.
///
/// Advisory only: a silent destination behind an answering middlebox looks
/// the same as a path that is simply broken past this hop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspectedDestination {
    pub hop_number: u8,
    pub address: IpAddr,
    pub round_trip_ms: Option<f64>,
}

/// Body of a traceroute run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceResponse {
    #[serde(rename = "targetIP")]
    pub target_ip: Option<IpAddr>,
    pub run_id: String,
    pub total_hops: usize,
    pub reached_destination: bool,
    pub hops: Vec<HopRecord>,
    pub suspected_destination: Option<SuspectedDestination>,
    pub err: Option<ErrorBody>,
}

impl TraceResponse {
    pub fn failed(target_ip: Option<IpAddr>, err: &ProbeError) -> Self {
        Self {
            target_ip,
            run_id: String::new(),
            total_hops: 0,
            reached_destination: false,
            hops: Vec::new(),
            suspected_destination: None,
            err: Some(err.to_body()),
        }
    }
}

/// Body of a path MTU discovery run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MtuResponse {
    #[serde(rename = "targetIP")]
    pub target_ip: Option<IpAddr>,
    pub run_id: String,
    #[serde(rename = "discoveredMTU")]
    pub discovered_mtu: Option<u16>,
    pub supports_jumbo: bool,
    /// Probes of the search phases, ordered by packet size.
    pub tests: Vec<MtuTestResult>,
    /// Probes of the boundary validation pass.
    pub validation: Vec<MtuTestResult>,
    pub err: Option<ErrorBody>,
}

impl MtuResponse {
    pub fn failed(target_ip: Option<IpAddr>, err: &ProbeError) -> Self {
        Self {
            target_ip,
            run_id: String::new(),
            discovered_mtu: None,
            supports_jumbo: false,
            tests: Vec::new(),
            validation: Vec::new(),
            err: Some(err.to_body()),
        }
    }
}

/// Body of a port scan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortScanResponse {
    #[serde(rename = "targetIP")]
    pub target_ip: Option<IpAddr>,
    pub total_ports: usize,
    pub open_ports: Vec<u16>,
    pub closed_ports: Vec<u16>,
    /// Only present for UDP scans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered_ports: Option<Vec<u16>>,
    pub results: Vec<PortScanResult>,
    pub err: Option<ErrorBody>,
}

impl PortScanResponse {
    pub fn failed(target_ip: Option<IpAddr>, err: &ProbeError) -> Self {
        Self {
            target_ip,
            total_ports: 0,
            open_ports: Vec::new(),
            closed_ports: Vec::new(),
            filtered_ports: None,
            results: Vec::new(),
            err: Some(err.to_body()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_stats_ignores_misses() {
        let stats = BurstStats::from_samples(&[10.0, -1.0, 14.0, 12.0]).unwrap();
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 14.0);
        assert_eq!(stats.avg, 12.0);
        assert_eq!(stats.jitter, 3.0);

        assert!(BurstStats::from_samples(&[-1.0, -1.0]).is_none());
    }

    #[test]
    fn test_envelope_flattens_body() {
        let body = PingResponse {
            target: "127.0.0.1".into(),
            ms: Some(0.2),
            ttl: 128,
            err: None,
        };
        let json = serde_json::to_value(Envelope::finish(body, Instant::now())).unwrap();
        assert_eq!(json["target"], "127.0.0.1");
        assert!(json["err"].is_null());
        assert!(json["timestamp"].is_string());
        assert!(json["responseTimeMs"].is_number());
    }

    #[test]
    fn test_failed_mtu_shape() {
        let err = ProbeError::HostNotFound {
            host: "nope.invalid".into(),
        };
        let json = serde_json::to_value(MtuResponse::failed(None, &err)).unwrap();
        assert!(json["discoveredMTU"].is_null());
        assert!(json["targetIP"].is_null());
        assert_eq!(json["err"]["name"], "HostNotFound");
    }

    #[test]
    fn test_filtered_ports_only_when_present() {
        let err = ProbeError::InvalidInput("bad".into());
        let json = serde_json::to_value(PortScanResponse::failed(None, &err)).unwrap();
        assert!(json.get("filteredPorts").is_none());
    }
}
