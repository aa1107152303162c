//! Port list requests.

use netprobe_core::{ProbeError, ScanProtocol};

const COMMON_TCP_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 111, 135, 139, 143, 443, 445, 993, 995, 1723, 3306, 3389, 5432,
    5900, 6379, 8080, 8443,
];

const COMMON_UDP_PORTS: &[u16] = &[
    53, 67, 69, 123, 137, 161, 500, 514, 1194, 1900, 5060, 5353, 11211,
];

/// How the ports of a scan are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMethod {
    /// One port.
    Single,
    /// The well-known list for the protocol.
    Common,
    /// An inclusive `start-end` range.
    Range,
    /// A comma separated list.
    Custom,
}

impl std::str::FromStr for ScanMethod {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SINGLE" => Ok(ScanMethod::Single),
            "COMMON" => Ok(ScanMethod::Common),
            "RANGE" => Ok(ScanMethod::Range),
            "CUSTOM" => Ok(ScanMethod::Custom),
            _ => Err(ProbeError::InvalidInput(format!(
                "unsupported scan method: {}",
                s
            ))),
        }
    }
}

/// Returns the well-known ports scanned by a `COMMON` request.
pub fn common_ports(protocol: ScanProtocol) -> &'static [u16] {
    match protocol {
        ScanProtocol::Tcp => COMMON_TCP_PORTS,
        ScanProtocol::Udp => COMMON_UDP_PORTS,
    }
}

/// Expands a port request into the list of ports to probe.
///
/// RANGE and CUSTOM requests may name at most `max_ports` ports; duplicates
/// in a CUSTOM list are collapsed, keeping the first occurrence.
pub fn parse_ports(
    protocol: ScanProtocol,
    method: ScanMethod,
    list: Option<&str>,
    max_ports: usize,
) -> Result<Vec<u16>, ProbeError> {
    let list = list.map(str::trim).filter(|s| !s.is_empty());

    match method {
        ScanMethod::Common => Ok(common_ports(protocol).to_vec()),
        ScanMethod::Single => {
            let list = required(list, method)?;
            Ok(vec![parse_port(list)?])
        }
        ScanMethod::Range => {
            let list = required(list, method)?;
            let (start, end) = list.split_once('-').ok_or_else(|| {
                ProbeError::InvalidInput(format!("port range must look like start-end: {}", list))
            })?;
            let start = parse_port(start)?;
            let end = parse_port(end)?;
            if start > end {
                return Err(ProbeError::InvalidInput(format!(
                    "port range start {} is after end {}",
                    start, end
                )));
            }
            let count = (end - start) as usize + 1;
            if count > max_ports {
                return Err(too_many(count, max_ports));
            }
            Ok((start..=end).collect())
        }
        ScanMethod::Custom => {
            let list = required(list, method)?;
            let mut ports = Vec::new();
            for part in list.split(',') {
                let port = parse_port(part)?;
                if !ports.contains(&port) {
                    ports.push(port);
                }
            }
            if ports.len() > max_ports {
                return Err(too_many(ports.len(), max_ports));
            }
            Ok(ports)
        }
    }
}

fn required(list: Option<&str>, method: ScanMethod) -> Result<&str, ProbeError> {
    list.ok_or_else(|| ProbeError::InvalidInput(format!("{:?} scan needs a port list", method)))
}

fn parse_port(raw: &str) -> Result<u16, ProbeError> {
    let raw = raw.trim();
    match raw.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ProbeError::InvalidInput(format!("invalid port: {:?}", raw))),
    }
}

fn too_many(count: usize, max_ports: usize) -> ProbeError {
    ProbeError::InvalidInput(format!(
        "{} ports requested, at most {} allowed",
        count, max_ports
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_from_str() {
        assert_eq!("range".parse::<ScanMethod>().unwrap(), ScanMethod::Range);
        assert_eq!("COMMON".parse::<ScanMethod>().unwrap(), ScanMethod::Common);
        assert!("SWEEP".parse::<ScanMethod>().is_err());
    }

    #[test]
    fn test_range_is_inclusive() {
        let ports = parse_ports(ScanProtocol::Tcp, ScanMethod::Range, Some("80-85"), 100).unwrap();
        assert_eq!(ports, vec![80, 81, 82, 83, 84, 85]);
    }

    #[test]
    fn test_range_cap() {
        assert_eq!(
            parse_ports(ScanProtocol::Tcp, ScanMethod::Range, Some("1-100"), 100)
                .unwrap()
                .len(),
            100
        );
        assert!(parse_ports(ScanProtocol::Tcp, ScanMethod::Range, Some("1-101"), 100).is_err());
        assert!(parse_ports(ScanProtocol::Tcp, ScanMethod::Range, Some("90-80"), 100).is_err());
        assert!(parse_ports(ScanProtocol::Tcp, ScanMethod::Range, Some("80"), 100).is_err());
    }

    #[test]
    fn test_custom_collapses_duplicates() {
        let ports =
            parse_ports(ScanProtocol::Udp, ScanMethod::Custom, Some("53, 123,53,161"), 100).unwrap();
        assert_eq!(ports, vec![53, 123, 161]);
    }

    #[test]
    fn test_custom_cap() {
        let list: Vec<String> = (1..=101).map(|p| p.to_string()).collect();
        let err = parse_ports(ScanProtocol::Tcp, ScanMethod::Custom, Some(&list.join(",")), 100)
            .unwrap_err();
        assert_eq!(err.name(), "InvalidInput");
    }

    #[test]
    fn test_invalid_ports() {
        for bad in ["0", "65536", "http", "-1", "22,,80"] {
            assert!(
                parse_ports(ScanProtocol::Tcp, ScanMethod::Custom, Some(bad), 100).is_err(),
                "{} should be rejected",
                bad
            );
        }
        assert!(parse_ports(ScanProtocol::Tcp, ScanMethod::Single, None, 100).is_err());
    }

    #[test]
    fn test_common_lists_differ() {
        let tcp = parse_ports(ScanProtocol::Tcp, ScanMethod::Common, None, 100).unwrap();
        let udp = parse_ports(ScanProtocol::Udp, ScanMethod::Common, None, 100).unwrap();
        assert!(tcp.contains(&22));
        assert!(!udp.contains(&22));
        assert!(udp.contains(&161));
    }
}
