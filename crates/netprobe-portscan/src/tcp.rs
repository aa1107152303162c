//! TCP connect probing.

use netprobe_core::PortStatus;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// Classifies `port` by attempting a full TCP connection.
///
/// A completed handshake is `open`; refusals, other errors and timeouts are
/// all `closed`.
pub async fn probe_tcp(addr: IpAddr, port: u16, connect_timeout: Duration) -> PortStatus {
    let target = SocketAddr::new(addr, port);
    match timeout(connect_timeout, TcpStream::connect(target)).await {
        Ok(Ok(_stream)) => PortStatus::Open,
        Ok(Err(e)) => {
            trace!(port = port, error = %e, "Connect failed");
            PortStatus::Closed
        }
        Err(_) => {
            trace!(port = port, "Connect timed out");
            PortStatus::Closed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_listening_port_is_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let status = probe_tcp("127.0.0.1".parse().unwrap(), port, Duration::from_secs(2)).await;
        assert_eq!(status, PortStatus::Open);
    }

    #[tokio::test]
    async fn test_released_port_is_closed() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let status = probe_tcp("127.0.0.1".parse().unwrap(), port, Duration::from_secs(2)).await;
        assert_eq!(status, PortStatus::Closed);
    }
}
