//! Parameters for each probe engine and request value normalization.

use crate::ProbeError;
use std::time::Duration;

/// Default TTL for ping requests.
pub const DEFAULT_PING_TTL: u8 = 128;
/// Default hop budget for traceroute requests.
pub const DEFAULT_MAX_HOPS: u8 = 30;
/// Largest hop budget a traceroute request may ask for.
pub const MAX_HOPS_LIMIT: u8 = 64;
/// Default number of samples in a ping burst.
pub const DEFAULT_BURST_COUNT: usize = 20;
/// Largest ping burst a request may ask for.
pub const MAX_BURST_COUNT: usize = 100;

/// Normalizes a user supplied TTL.
///
/// Values below 1 become 1, values above 255 become 255, and anything that is
/// not a number becomes the default of 128.
pub fn ttl_normalize(raw: Option<&str>) -> u8 {
    clamp_numeric(raw, 1, u8::MAX as i64, DEFAULT_PING_TTL as i64) as u8
}

/// Normalizes a user supplied traceroute hop budget into `1..=64`.
pub fn max_hops_normalize(raw: Option<&str>) -> u8 {
    clamp_numeric(raw, 1, MAX_HOPS_LIMIT as i64, DEFAULT_MAX_HOPS as i64) as u8
}

/// Normalizes a user supplied ping burst size into `1..=100`.
pub fn burst_count_normalize(raw: Option<&str>) -> usize {
    clamp_numeric(raw, 1, MAX_BURST_COUNT as i64, DEFAULT_BURST_COUNT as i64) as usize
}

fn clamp_numeric(raw: Option<&str>, min: i64, max: i64, default: i64) -> i64 {
    let Some(value) = raw.map(str::trim).and_then(|s| s.parse::<f64>().ok()) else {
        return default;
    };
    if value.is_nan() {
        return default;
    }
    (value.trunc() as i64).clamp(min, max)
}

/// Parameters for a single ping.
#[derive(Debug, Clone)]
pub struct PingParams {
    /// Time to wait for a matching answer.
    pub timeout: Duration,
    /// Bytes of echo payload after the ICMP header.
    pub payload_size: usize,
    /// Pause between samples of a burst.
    pub burst_interval: Duration,
}

impl Default for PingParams {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1000),
            payload_size: 56,
            burst_interval: Duration::from_millis(100),
        }
    }
}

impl PingParams {
    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.timeout.is_zero() {
            return Err(ProbeError::InvalidInput("ping timeout must be positive".into()));
        }
        Ok(())
    }
}

/// Parameters for a traceroute run.
#[derive(Debug, Clone)]
pub struct TraceParams {
    /// Highest TTL to probe.
    pub max_hops: u8,
    /// Time to wait for each hop.
    pub timeout: Duration,
    /// Abort once this many hops in a row stayed silent.
    pub max_consecutive_timeouts: u8,
    /// Trailing silent hops needed before the last responder is flagged as the
    /// suspected destination.
    pub suspect_after_timeouts: u8,
    /// Bytes of echo payload after the ICMP header.
    pub payload_size: usize,
}

impl Default for TraceParams {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            timeout: Duration::from_millis(700),
            max_consecutive_timeouts: 8,
            suspect_after_timeouts: 5,
            payload_size: 32,
        }
    }
}

impl TraceParams {
    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.max_hops == 0 || self.max_hops > MAX_HOPS_LIMIT {
            return Err(ProbeError::InvalidInput(format!(
                "maxHops must be within 1-{}, got {}",
                MAX_HOPS_LIMIT, self.max_hops
            )));
        }
        if self.max_consecutive_timeouts == 0 {
            return Err(ProbeError::InvalidInput(
                "consecutive timeout cap must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Parameters for path MTU discovery.
#[derive(Debug, Clone)]
pub struct MtuParams {
    /// Time to wait for each packet size.
    pub probe_timeout: Duration,
    /// Pause between consecutive probes.
    pub inter_probe_delay: Duration,
}

impl Default for MtuParams {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(500),
            inter_probe_delay: Duration::from_millis(50),
        }
    }
}

impl MtuParams {
    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.probe_timeout.is_zero() {
            return Err(ProbeError::InvalidInput("MTU probe timeout must be positive".into()));
        }
        Ok(())
    }
}

/// Parameters for a port scan.
#[derive(Debug, Clone)]
pub struct ScanParams {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Time to wait for a UDP answer.
    pub udp_timeout: Duration,
    /// Most ports a RANGE or CUSTOM request may name.
    pub max_ports: usize,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(2000),
            udp_timeout: Duration::from_millis(2000),
            max_ports: 100,
        }
    }
}

impl ScanParams {
    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.max_ports == 0 {
            return Err(ProbeError::InvalidInput("port cap must be positive".into()));
        }
        Ok(())
    }
}
