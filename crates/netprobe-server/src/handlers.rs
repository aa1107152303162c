//! HTTP request handlers.
//!
//! Every probe endpoint answers HTTP 200 with a JSON body; failures are
//! reported in the body's `err` field.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use netprobe_core::params::{burst_count_normalize, max_hops_normalize, ttl_normalize};
use netprobe_core::{
    resolve_target, Envelope, MtuParams, MtuResponse, PingParams, PingResponse,
    PortScanResponse, ProbeContext, ProbeError, ProbeTarget, ScanParams, SmokepingResponse,
    TraceParams, TraceResponse,
};
use netprobe_icmp::{discover_target_mtu, outcome_error, ping, ping_burst, trace_target};
use netprobe_portscan::scan_ports;
use serde::Deserialize;
use std::future::Future;
use std::net::IpAddr;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Per-engine parameters applied to every request.
#[derive(Debug, Clone, Default)]
pub struct EngineParams {
    pub ping: PingParams,
    pub trace: TraceParams,
    pub mtu: MtuParams,
    pub scan: ScanParams,
}

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub ctx: ProbeContext,
    pub params: EngineParams,
}

/// Query parameters for the ping endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct PingQuery {
    pub ttl: Option<String>,
}

/// Query parameters for the smokeping endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SmokepingQuery {
    pub count: Option<String>,
}

/// Query parameters for the traceroute endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct TraceQuery {
    #[serde(rename = "maxHops")]
    pub max_hops: Option<String>,
}

/// Creates the Axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ping/:host", get(handle_ping))
        .route("/smokeping/:host", get(handle_smokeping))
        .route("/trace/:host", get(handle_trace))
        .route("/mtu/:host", get(handle_mtu))
        .route("/portscan/:protocol/:method/:host", get(handle_portscan))
        .route(
            "/portscan/:protocol/:method/:host/:ports",
            get(handle_portscan_with_ports),
        )
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Health check endpoint.
async fn handle_health() -> &'static str {
    "ok"
}

/// Runs an engine on its own task. A panic inside the engine is logged and
/// reported to the client as a generic internal error.
async fn run_engine<T, F>(operation: &'static str, engine: F) -> Result<T, ProbeError>
where
    F: Future<Output = Result<T, ProbeError>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(engine).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            log_failure(operation, &e);
            Err(e)
        }
        Err(e) => {
            error!(operation = operation, error = %e, "Probe task failed");
            Err(ProbeError::Internal(e.to_string()))
        }
    }
}

/// Resolves `host`, then runs `engine` against the target through
/// [`run_engine`]. Failures after resolution carry the resolved address.
async fn run_resolved<T, F, Fut>(
    operation: &'static str,
    ctx: &ProbeContext,
    host: &str,
    engine: F,
) -> Result<T, (Option<IpAddr>, ProbeError)>
where
    F: FnOnce(ProbeTarget) -> Fut,
    Fut: Future<Output = Result<T, ProbeError>> + Send + 'static,
    T: Send + 'static,
{
    let target = match resolve_target(ctx.resolver.as_ref(), host).await {
        Ok(target) => target,
        Err(e) => {
            log_failure(operation, &e);
            return Err((None, e));
        }
    };
    let addr = target.addr;
    run_engine(operation, engine(target))
        .await
        .map_err(|e| (Some(addr), e))
}

fn log_failure(operation: &str, err: &ProbeError) {
    match err {
        e if e.is_expected() => debug!(operation = operation, error = %e, "Probe failed"),
        ProbeError::InvalidInput(_) | ProbeError::HostNotFound { .. } => {
            debug!(operation = operation, error = %err, "Rejected request")
        }
        ProbeError::PermissionDenied(_) => {
            warn!(operation = operation, error = %err, "Probe failed")
        }
        e => error!(operation = operation, error = %e, "Probe failed"),
    }
}

/// Handles GET /ping/:host.
async fn handle_ping(
    State(state): State<AppState>,
    Path(host): Path<String>,
    Query(query): Query<PingQuery>,
) -> Json<Envelope<PingResponse>> {
    let started = Instant::now();
    let ttl = ttl_normalize(query.ttl.as_deref());

    let AppState { ctx, params } = state;
    let target = host.clone();
    let result = run_engine("ping", async move {
        ping(&ctx, &target, ttl, &params.ping).await
    })
    .await;

    let body = match result {
        Ok((_, outcome)) => PingResponse {
            target: host,
            ms: outcome.round_trip_ms,
            ttl,
            err: outcome_error(&outcome).map(|e| e.to_body()),
        },
        Err(e) => PingResponse {
            target: host,
            ms: None,
            ttl,
            err: Some(e.to_body()),
        },
    };
    Json(Envelope::finish(body, started))
}

/// Handles GET /smokeping/:host.
async fn handle_smokeping(
    State(state): State<AppState>,
    Path(host): Path<String>,
    Query(query): Query<SmokepingQuery>,
) -> Json<Envelope<SmokepingResponse>> {
    let started = Instant::now();
    let count = burst_count_normalize(query.count.as_deref());

    let AppState { ctx, params } = state;
    let target = host.clone();
    let result = run_engine("smokeping", async move {
        ping_burst(&ctx, &target, count, &params.ping).await
    })
    .await;

    let body = result.unwrap_or_else(|e| SmokepingResponse::failed(host, &e));
    Json(Envelope::finish(body, started))
}

/// Handles GET /trace/:host.
async fn handle_trace(
    State(state): State<AppState>,
    Path(host): Path<String>,
    Query(query): Query<TraceQuery>,
) -> Json<Envelope<TraceResponse>> {
    let started = Instant::now();
    let trace_params = TraceParams {
        max_hops: max_hops_normalize(query.max_hops.as_deref()),
        ..state.params.trace
    };

    let ctx = state.ctx;
    let engine_ctx = ctx.clone();
    let result = run_resolved("traceroute", &ctx, &host, |target| async move {
        trace_target(&engine_ctx, &target, &trace_params).await
    })
    .await;

    let body = result.unwrap_or_else(|(ip, e)| TraceResponse::failed(ip, &e));
    Json(Envelope::finish(body, started))
}

/// Handles GET /mtu/:host.
async fn handle_mtu(
    State(state): State<AppState>,
    Path(host): Path<String>,
) -> Json<Envelope<MtuResponse>> {
    let started = Instant::now();

    let AppState { ctx, params } = state;
    let engine_ctx = ctx.clone();
    let result = run_resolved("mtu", &ctx, &host, |target| async move {
        discover_target_mtu(&engine_ctx, &target, &params.mtu).await
    })
    .await;

    let body = result.unwrap_or_else(|(ip, e)| MtuResponse::failed(ip, &e));
    Json(Envelope::finish(body, started))
}

/// Handles GET /portscan/:protocol/:method/:host.
async fn handle_portscan(
    State(state): State<AppState>,
    Path((protocol, method, host)): Path<(String, String, String)>,
) -> Json<Envelope<PortScanResponse>> {
    portscan(state, protocol, method, host, None).await
}

/// Handles GET /portscan/:protocol/:method/:host/:ports.
async fn handle_portscan_with_ports(
    State(state): State<AppState>,
    Path((protocol, method, host, ports)): Path<(String, String, String, String)>,
) -> Json<Envelope<PortScanResponse>> {
    portscan(state, protocol, method, host, Some(ports)).await
}

async fn portscan(
    state: AppState,
    protocol: String,
    method: String,
    host: String,
    ports: Option<String>,
) -> Json<Envelope<PortScanResponse>> {
    let started = Instant::now();

    let AppState { ctx, params } = state;
    let result = run_engine("portscan", async move {
        scan_ports(&ctx, &protocol, &method, &host, ports.as_deref(), &params.scan).await
    })
    .await;

    let body = result.unwrap_or_else(|e| PortScanResponse::failed(None, &e));
    Json(Envelope::finish(body, started))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use netprobe_core::{HopStatus, PortStatus, Resolver, SequenceCounter};
    use netprobe_icmp::testing::{Reply, ScriptedFactory};
    use std::net::IpAddr;
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedResolver;

    #[async_trait]
    impl Resolver for FixedResolver {
        async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, ProbeError> {
            match host {
                "router.test" => Ok(vec!["198.51.100.7".parse().unwrap()]),
                _ => Err(ProbeError::HostNotFound { host: host.into() }),
            }
        }
    }

    fn state(factory: &ScriptedFactory) -> AppState {
        let ctx = ProbeContext::new(Arc::new(FixedResolver), Arc::new(factory.clone()))
            .with_sequence(Arc::new(SequenceCounter::new(0)));
        let params = EngineParams {
            ping: PingParams {
                timeout: Duration::from_millis(10),
                burst_interval: Duration::ZERO,
                ..Default::default()
            },
            trace: TraceParams {
                timeout: Duration::from_millis(10),
                ..Default::default()
            },
            mtu: MtuParams {
                probe_timeout: Duration::from_millis(10),
                inter_probe_delay: Duration::ZERO,
            },
            scan: ScanParams {
                udp_timeout: Duration::from_millis(200),
                ..Default::default()
            },
        };
        AppState { ctx, params }
    }

    fn echo_everything() -> ScriptedFactory {
        ScriptedFactory::new(|sent| vec![Reply::EchoReply { from: sent.dest }])
    }

    #[tokio::test]
    async fn test_ping_reply() {
        let factory = echo_everything();
        let Json(body) = handle_ping(
            State(state(&factory)),
            Path("router.test".into()),
            Query(PingQuery::default()),
        )
        .await;

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["target"], "router.test");
        assert_eq!(json["ttl"], 128);
        assert!(json["ms"].as_f64().unwrap() >= 0.0);
        assert!(json["err"].is_null());
        assert!(json["timestamp"].is_string());
        assert!(json["responseTimeMs"].is_number());
    }

    #[tokio::test]
    async fn test_ping_normalizes_ttl() {
        let factory = echo_everything();
        let Json(body) = handle_ping(
            State(state(&factory)),
            Path("198.51.100.7".into()),
            Query(PingQuery {
                ttl: Some("999".into()),
            }),
        )
        .await;

        assert_eq!(body.body.ttl, 255);
        assert_eq!(factory.sent()[0].ttl, Some(255));
    }

    #[tokio::test]
    async fn test_ping_timeout_is_reported_in_body() {
        let factory = ScriptedFactory::silent();
        let Json(body) = handle_ping(
            State(state(&factory)),
            Path("198.51.100.7".into()),
            Query(PingQuery::default()),
        )
        .await;

        assert!(body.body.ms.is_none());
        assert_eq!(body.body.err.unwrap().name, "Timeout");
    }

    #[tokio::test]
    async fn test_ping_unknown_host() {
        let factory = echo_everything();
        let Json(body) = handle_ping(
            State(state(&factory)),
            Path("nowhere.test".into()),
            Query(PingQuery::default()),
        )
        .await;

        assert_eq!(body.body.err.unwrap().name, "HostNotFound");
        assert_eq!(factory.open_count(), 0);
    }

    #[tokio::test]
    async fn test_ping_permission_denied() {
        let factory = ScriptedFactory::denied();
        let Json(body) = handle_ping(
            State(state(&factory)),
            Path("198.51.100.7".into()),
            Query(PingQuery::default()),
        )
        .await;

        let err = body.body.err.unwrap();
        assert_eq!(err.name, "PermissionDenied");
        assert!(err.message.contains(netprobe_core::RAW_SOCKET_PERMISSION_DENIED));
    }

    #[tokio::test]
    async fn test_smokeping_counts() {
        let factory = echo_everything();
        let Json(body) = handle_smokeping(
            State(state(&factory)),
            Path("198.51.100.7".into()),
            Query(SmokepingQuery {
                count: Some("5".into()),
            }),
        )
        .await;

        assert_eq!(body.body.sent, 5);
        assert_eq!(body.body.received, 5);
        assert!(body.body.stats.is_some());
    }

    #[tokio::test]
    async fn test_trace_respects_max_hops() {
        let factory = ScriptedFactory::new(|sent| {
            vec![Reply::TimeExceeded {
                from: format!("10.0.0.{}", sent.ttl.unwrap_or(0)).parse().unwrap(),
            }]
        });
        let Json(body) = handle_trace(
            State(state(&factory)),
            Path("198.51.100.7".into()),
            Query(TraceQuery {
                max_hops: Some("3".into()),
            }),
        )
        .await;

        assert_eq!(body.body.total_hops, 3);
        assert!(body.body.hops.iter().all(|h| h.status == HopStatus::Intermediate));
        assert!(!body.body.reached_destination);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["targetIP"], "198.51.100.7");
    }

    #[tokio::test]
    async fn test_trace_failure_keeps_shape() {
        let factory = ScriptedFactory::denied();
        let Json(body) = handle_trace(
            State(state(&factory)),
            Path("198.51.100.7".into()),
            Query(TraceQuery::default()),
        )
        .await;

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["err"]["name"], "PermissionDenied");
        assert_eq!(json["targetIP"], "198.51.100.7");
        assert_eq!(json["hops"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_trace_failure_reports_resolved_address() {
        let factory = ScriptedFactory::denied();
        let Json(body) = handle_trace(
            State(state(&factory)),
            Path("router.test".into()),
            Query(TraceQuery::default()),
        )
        .await;

        assert_eq!(body.body.err.unwrap().name, "PermissionDenied");
        assert_eq!(body.body.target_ip, Some("198.51.100.7".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_trace_unknown_host_has_no_address() {
        let factory = echo_everything();
        let Json(body) = handle_trace(
            State(state(&factory)),
            Path("nowhere.test".into()),
            Query(TraceQuery::default()),
        )
        .await;

        assert_eq!(body.body.err.unwrap().name, "HostNotFound");
        assert!(body.body.target_ip.is_none());
        assert_eq!(factory.open_count(), 0);
    }

    #[tokio::test]
    async fn test_mtu_failure_reports_resolved_address() {
        let factory = ScriptedFactory::denied();
        let Json(body) = handle_mtu(State(state(&factory)), Path("router.test".into())).await;

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["err"]["name"], "PermissionDenied");
        assert_eq!(json["targetIP"], "198.51.100.7");
        assert!(json["discoveredMTU"].is_null());
    }

    #[tokio::test]
    async fn test_mtu_discovers_scripted_limit() {
        let factory = ScriptedFactory::new(|sent| {
            if sent.wire_size() <= 1400 {
                vec![Reply::EchoReply { from: sent.dest }]
            } else {
                vec![Reply::PacketTooBig {
                    from: "10.0.0.1".parse().unwrap(),
                    mtu: 1400,
                }]
            }
        });
        let Json(body) = handle_mtu(State(state(&factory)), Path("198.51.100.7".into())).await;

        assert_eq!(body.body.discovered_mtu, Some(1400));
        assert!(body.body.err.is_none());
    }

    #[tokio::test]
    async fn test_portscan_rejects_bad_method() {
        let factory = ScriptedFactory::silent();
        let Json(body) = handle_portscan(
            State(state(&factory)),
            Path(("tcp".into(), "SWEEP".into(), "127.0.0.1".into())),
        )
        .await;

        assert_eq!(body.body.err.unwrap().name, "InvalidInput");
        assert_eq!(body.body.total_ports, 0);
    }

    #[tokio::test]
    async fn test_portscan_single_loopback() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let factory = ScriptedFactory::silent();
        let Json(body) = handle_portscan_with_ports(
            State(state(&factory)),
            Path((
                "tcp".into(),
                "SINGLE".into(),
                "127.0.0.1".into(),
                port.to_string(),
            )),
        )
        .await;

        assert_eq!(body.body.total_ports, 1);
        assert_eq!(body.body.results[0].status, PortStatus::Open);
        assert_eq!(body.body.open_ports, vec![port]);
    }

    #[tokio::test]
    async fn test_engine_panic_becomes_internal_error() {
        let result: Result<(), ProbeError> = run_engine("test", async {
            if true {
                panic!("engine exploded");
            }
            Ok(())
        })
        .await;

        let body = result.unwrap_err().to_body();
        assert_eq!(body.name, "InternalError");
        assert!(!body.message.contains("exploded"));
    }
}
