//! Well-known service names and the risk notes attached to them.

use netprobe_core::ScanProtocol;

/// Annotation for an open port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub risk: Option<&'static str>,
}

const fn service(name: &'static str, risk: Option<&'static str>) -> Option<ServiceInfo> {
    Some(ServiceInfo { name, risk })
}

/// Looks up the usual service on `port`.
pub fn service_info(protocol: ScanProtocol, port: u16) -> Option<ServiceInfo> {
    match protocol {
        ScanProtocol::Tcp => tcp_service(port),
        ScanProtocol::Udp => udp_service(port),
    }
}

fn tcp_service(port: u16) -> Option<ServiceInfo> {
    match port {
        21 => service("FTP", Some("Cleartext credentials; anonymous login often enabled")),
        22 => service("SSH", None),
        23 => service("Telnet", Some("Cleartext remote shell")),
        25 => service("SMTP", Some("May allow open relay")),
        53 => service("DNS", None),
        80 => service("HTTP", None),
        110 => service("POP3", Some("Cleartext credentials")),
        111 => service("RPCbind", Some("Exposes RPC service map")),
        135 => service("MSRPC", Some("Frequent target of Windows exploits")),
        139 => service("NetBIOS-SSN", Some("Legacy file sharing exposed")),
        143 => service("IMAP", Some("Cleartext credentials")),
        443 => service("HTTPS", None),
        445 => service("SMB", Some("File sharing exposed to the network")),
        993 => service("IMAPS", None),
        995 => service("POP3S", None),
        1433 => service("MSSQL", Some("Database exposed to the network")),
        1723 => service("PPTP", Some("Weak VPN protocol")),
        2375 => service("Docker", Some("Unauthenticated Docker API")),
        3306 => service("MySQL", Some("Database exposed to the network")),
        3389 => service("RDP", Some("Remote desktop exposed")),
        5432 => service("PostgreSQL", Some("Database exposed to the network")),
        5900 => service("VNC", Some("Remote desktop often weakly authenticated")),
        6379 => service("Redis", Some("Often unauthenticated")),
        8080 => service("HTTP-Proxy", None),
        8443 => service("HTTPS-Alt", None),
        9200 => service("Elasticsearch", Some("Often unauthenticated")),
        27017 => service("MongoDB", Some("Often unauthenticated")),
        _ => None,
    }
}

fn udp_service(port: u16) -> Option<ServiceInfo> {
    match port {
        7 => service("Echo", Some("Usable for reflection attacks")),
        19 => service("Chargen", Some("Usable for amplification attacks")),
        53 => service("DNS", Some("Open resolvers enable amplification")),
        67 => service("DHCP", None),
        69 => service("TFTP", Some("Unauthenticated file transfer")),
        111 => service("Portmapper", Some("Usable for amplification attacks")),
        123 => service("NTP", Some("monlist enables amplification")),
        137 => service("NetBIOS-NS", Some("Leaks host and domain names")),
        161 => service("SNMP", Some("Default communities leak device data")),
        443 => service("QUIC", None),
        500 => service("IKE", None),
        514 => service("Syslog", Some("Accepts unauthenticated log injection")),
        1194 => service("OpenVPN", None),
        1900 => service("SSDP", Some("Usable for amplification attacks")),
        5060 => service("SIP", Some("Toll fraud and enumeration target")),
        5353 => service("mDNS", Some("Leaks local service inventory")),
        11211 => service("Memcached", Some("Usable for amplification attacks")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_services() {
        let ssh = service_info(ScanProtocol::Tcp, 22).unwrap();
        assert_eq!(ssh.name, "SSH");
        assert!(ssh.risk.is_none());

        let telnet = service_info(ScanProtocol::Tcp, 23).unwrap();
        assert!(telnet.risk.is_some());

        assert_eq!(service_info(ScanProtocol::Udp, 161).unwrap().name, "SNMP");
    }

    #[test]
    fn test_protocols_have_separate_tables() {
        assert_eq!(service_info(ScanProtocol::Tcp, 443).unwrap().name, "HTTPS");
        assert_eq!(service_info(ScanProtocol::Udp, 443).unwrap().name, "QUIC");
        assert!(service_info(ScanProtocol::Udp, 22).is_none());
    }

    #[test]
    fn test_unknown_port() {
        assert!(service_info(ScanProtocol::Tcp, 40000).is_none());
    }
}
