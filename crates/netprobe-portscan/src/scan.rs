//! Scan driver: parses the request, probes every port concurrently and
//! summarizes the results.

use crate::ports::{parse_ports, ScanMethod};
use crate::services::service_info;
use crate::tcp::probe_tcp;
use crate::udp::probe_udp;
use futures::future::join_all;
use netprobe_core::{
    resolve_target, OperationOutcome, PortScanResponse, PortScanResult, PortStatus,
    ProbeContext, ProbeError, ScanParams, ScanProtocol,
};
use std::net::IpAddr;
use std::time::Instant;
use tracing::{debug, info};

/// Scans `host` for the ports named by `method` and `ports`.
///
/// Protocol, method and port list are validated before the host is resolved
/// or any probe is sent.
pub async fn scan_ports(
    ctx: &ProbeContext,
    protocol: &str,
    method: &str,
    host: &str,
    ports: Option<&str>,
    params: &ScanParams,
) -> Result<PortScanResponse, ProbeError> {
    params.validate()?;
    let protocol: ScanProtocol = protocol.parse()?;
    let method: ScanMethod = method.parse()?;
    let port_list = parse_ports(protocol, method, ports, params.max_ports)?;

    let target = resolve_target(ctx.resolver.as_ref(), host).await?;
    let started = Instant::now();
    debug!(ip = %target.addr, protocol = %protocol, ports = port_list.len(), "Starting scan");

    let probes = port_list
        .iter()
        .map(|&port| probe_port(protocol, target.addr, port, params));
    let statuses = match join_all(probes)
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(statuses) => statuses,
        Err(e) => {
            ctx.metrics
                .record("portscan", OperationOutcome::Failure, started.elapsed());
            return Err(e);
        }
    };

    let results: Vec<PortScanResult> = port_list
        .iter()
        .zip(statuses)
        .map(|(&port, status)| annotate(protocol, port, status))
        .collect();

    let response = summarize(target.addr, protocol, results);
    ctx.metrics
        .record("portscan", OperationOutcome::Success, started.elapsed());
    info!(
        ip = %target.addr,
        protocol = %protocol,
        total = response.total_ports,
        open = response.open_ports.len(),
        "Scan finished"
    );
    Ok(response)
}

async fn probe_port(
    protocol: ScanProtocol,
    addr: IpAddr,
    port: u16,
    params: &ScanParams,
) -> Result<PortStatus, ProbeError> {
    match protocol {
        ScanProtocol::Tcp => Ok(probe_tcp(addr, port, params.connect_timeout).await),
        ScanProtocol::Udp => probe_udp(addr, port, params.udp_timeout).await,
    }
}

fn annotate(protocol: ScanProtocol, port: u16, status: PortStatus) -> PortScanResult {
    let service = service_info(protocol, port);
    PortScanResult {
        port,
        protocol,
        status,
        service_name: service.map(|s| s.name.to_string()),
        security_risk: service.and_then(|s| s.risk).map(str::to_string),
    }
}

fn summarize(
    target: IpAddr,
    protocol: ScanProtocol,
    results: Vec<PortScanResult>,
) -> PortScanResponse {
    let mut open_ports = Vec::new();
    let mut closed_ports = Vec::new();
    let mut filtered_ports = Vec::new();
    for result in &results {
        match result.status {
            PortStatus::Open => open_ports.push(result.port),
            PortStatus::Closed => closed_ports.push(result.port),
            PortStatus::OpenFiltered => filtered_ports.push(result.port),
        }
    }
    open_ports.sort_unstable();
    closed_ports.sort_unstable();
    filtered_ports.sort_unstable();

    PortScanResponse {
        target_ip: Some(target),
        total_ports: results.len(),
        open_ports,
        closed_ports,
        filtered_ports: (protocol == ScanProtocol::Udp).then_some(filtered_ports),
        results,
        err: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_sorts_and_splits() {
        let results = vec![
            annotate(ScanProtocol::Udp, 161, PortStatus::OpenFiltered),
            annotate(ScanProtocol::Udp, 123, PortStatus::Open),
            annotate(ScanProtocol::Udp, 53, PortStatus::Open),
            annotate(ScanProtocol::Udp, 69, PortStatus::Closed),
        ];
        let response = summarize("192.0.2.10".parse().unwrap(), ScanProtocol::Udp, results);

        assert_eq!(response.total_ports, 4);
        assert_eq!(response.open_ports, vec![53, 123]);
        assert_eq!(response.closed_ports, vec![69]);
        assert_eq!(response.filtered_ports, Some(vec![161]));
    }

    #[test]
    fn test_tcp_summary_has_no_filtered_list() {
        let results = vec![annotate(ScanProtocol::Tcp, 22, PortStatus::Closed)];
        let response = summarize("192.0.2.10".parse().unwrap(), ScanProtocol::Tcp, results);
        assert!(response.filtered_ports.is_none());
    }

    #[test]
    fn test_annotation() {
        let result = annotate(ScanProtocol::Tcp, 23, PortStatus::Open);
        assert_eq!(result.service_name.as_deref(), Some("Telnet"));
        assert!(result.security_risk.is_some());

        let unknown = annotate(ScanProtocol::Tcp, 40000, PortStatus::Closed);
        assert!(unknown.service_name.is_none());
        assert!(unknown.security_risk.is_none());
    }
}
