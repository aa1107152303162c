//! HTTP server binary for netprobe.

use clap::Parser;
use netprobe_core::{MtuParams, PingParams, ProbeContext, ScanParams, TraceParams};
use netprobe_packets::RawSocketFactory;
use netprobe_server::{create_router, AppState, CachingResolver, EngineParams, TracingMetrics};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Network diagnostics HTTP server.
#[derive(Parser, Debug)]
#[command(name = "netprobe-server")]
#[command(version)]
#[command(about = "Ping, traceroute, MTU discovery and port scanning over HTTP")]
struct Args {
    /// Address to listen on.
    #[arg(short = 'a', long, default_value = "0.0.0.0:3765")]
    addr: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", default_value = "info")]
    log_level: String,

    /// Seconds to cache DNS answers (0 disables the cache).
    #[arg(long = "dns-cache-secs", default_value_t = 300)]
    dns_cache_secs: u64,

    /// Ping reply timeout in milliseconds.
    #[arg(long = "ping-timeout-ms", default_value_t = 1000)]
    ping_timeout_ms: u64,

    /// Per-hop traceroute timeout in milliseconds.
    #[arg(long = "trace-timeout-ms", default_value_t = 700)]
    trace_timeout_ms: u64,

    /// Per-size MTU probe timeout in milliseconds.
    #[arg(long = "mtu-timeout-ms", default_value_t = 500)]
    mtu_timeout_ms: u64,

    /// TCP connect timeout in milliseconds.
    #[arg(long = "tcp-timeout-ms", default_value_t = 2000)]
    tcp_timeout_ms: u64,

    /// UDP reply timeout in milliseconds.
    #[arg(long = "udp-timeout-ms", default_value_t = 2000)]
    udp_timeout_ms: u64,
}

impl Args {
    fn engine_params(&self) -> EngineParams {
        EngineParams {
            ping: PingParams {
                timeout: Duration::from_millis(self.ping_timeout_ms),
                ..Default::default()
            },
            trace: TraceParams {
                timeout: Duration::from_millis(self.trace_timeout_ms),
                ..Default::default()
            },
            mtu: MtuParams {
                probe_timeout: Duration::from_millis(self.mtu_timeout_ms),
                ..Default::default()
            },
            scan: ScanParams {
                connect_timeout: Duration::from_millis(self.tcp_timeout_ms),
                udp_timeout: Duration::from_millis(self.udp_timeout_ms),
                ..Default::default()
            },
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = match args.log_level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let addr: SocketAddr = args.addr.parse().unwrap_or_else(|e| {
        eprintln!("Invalid address {}: {}", args.addr, e);
        std::process::exit(1);
    });

    let params = args.engine_params();
    for check in [
        params.ping.validate(),
        params.trace.validate(),
        params.mtu.validate(),
        params.scan.validate(),
    ] {
        if let Err(e) = check {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    }

    let resolver = CachingResolver::new(Duration::from_secs(args.dns_cache_secs));
    let ctx = ProbeContext::new(Arc::new(resolver), Arc::new(RawSocketFactory))
        .with_metrics(Arc::new(TracingMetrics));
    let router = create_router(AppState { ctx, params });

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap_or_else(|e| {
        eprintln!("Failed to bind to {}: {}", addr, e);
        std::process::exit(1);
    });

    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, router).await.unwrap_or_else(|e| {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    });
}
