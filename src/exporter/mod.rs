use crate::{
    cli::telemetry::shutdown_tracer,
    diagnostics::{
        CapabilityProbe, CommandRunner, DiagnosticFacility, DiagnosticsConfig, DumpCoordinator,
        HandlerRegistry, jcmd::JcmdFacility,
    },
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::{Next, from_fn},
    response::Response,
    routing::{get, post},
};
use opentelemetry::global;
use opentelemetry::trace::{TraceContextExt, TraceId};
use opentelemetry_http::HeaderExtractor;
use std::{net::IpAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, task};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, error, info, info_span, warn};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use ulid::Ulid;

mod handlers;
pub mod metrics;
mod shutdown;

pub use self::metrics::DiagnosticsMetrics;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = if let Some(hash) = built_info::GIT_COMMIT_HASH {
    hash
} else {
    ":-("
};

/// How long startup waits for the first attach before serving anyway.
const STARTUP_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// The JVM the exporter is attached to, as reported by `/health`.
#[derive(Clone, Copy, Debug)]
pub struct Target {
    pub pid: u32,
}

/// Shared services behind the HTTP endpoints.
#[derive(Clone)]
pub struct Services {
    pub coordinator: Arc<DumpCoordinator>,
    pub commands: CommandRunner,
    pub metrics: DiagnosticsMetrics,
}

impl Services {
    /// Wire the coordinator and command runner to a single capability probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be registered.
    pub fn new(probe: Arc<CapabilityProbe>, config: &DiagnosticsConfig) -> Result<Self> {
        let coordinator = DumpCoordinator::new(
            Arc::clone(&probe),
            HandlerRegistry::from_config(config),
        )
        .with_file_prefix(config.file_prefix.clone())
        .with_dump_dir(config.dump_dir.clone());

        Ok(Self {
            coordinator: Arc::new(coordinator),
            commands: CommandRunner::new(probe),
            metrics: DiagnosticsMetrics::new()?,
        })
    }
}

/// Routes for the enabled endpoint groups. Disabled groups are not routed at
/// all and answer 404.
pub fn router(services: Services, config: &DiagnosticsConfig) -> Router {
    let mut app = Router::new()
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health).options(handlers::health));

    if config.heapdump_enabled {
        app = app
            .route("/heapdump", get(handlers::heapdump))
            .route("/heapdump/live", get(handlers::heapdump_live))
            .route("/heapdump/trigger", post(handlers::trigger));
    }

    if config.jvmdiagnostics_enabled {
        app = app
            .route("/jvmdiagnostics/jmap-histo", get(handlers::class_histogram))
            .route(
                "/jvmdiagnostics/jmap-histo.json",
                get(handlers::class_histogram_json),
            )
            .route("/jvmdiagnostics/jstack", get(handlers::thread_dump));
    }

    app.layer(
        ServiceBuilder::new()
            .layer(Extension(services.coordinator))
            .layer(Extension(services.commands))
            .layer(Extension(services.metrics))
            .layer(Extension(Target { pid: config.pid })),
    )
}

pub async fn new(port: u16, listen: Option<String>, config: DiagnosticsConfig) -> Result<()> {
    let pid = config.pid;
    let java_home = config.java_home.clone();

    let probe = Arc::new(CapabilityProbe::new(move || {
        let facility = JcmdFacility::detect(pid, java_home.as_deref())?;
        Ok(Arc::new(facility) as Arc<dyn DiagnosticFacility>)
    }));

    // attach once before serving so the first request does not pay for it
    let available = warm_up(Arc::clone(&probe), STARTUP_PROBE_TIMEOUT).await;

    match available {
        Some(true) => {}
        Some(false) => {
            warn!(pid, "JVM diagnostics unavailable, diagnostic endpoints will answer 404");
        }
        None => warn!(
            pid,
            timeout = ?STARTUP_PROBE_TIMEOUT,
            "JVM attach still running, serving while it completes"
        ),
    }

    let services = Services::new(probe, &config)?;
    let handler_names: Vec<String> = services
        .coordinator
        .handlers()
        .handler_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(make_span)
        .on_response(on_response);

    let app = router(services, &config).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(trace_layer)
            .layer(from_fn(add_trace_headers)),
    );

    let (listener, bind_addr) = bind(port, listen).await?;

    println!(
        "{} {} - Listening on {bind_addr}\n\nTarget JVM: {pid} ({})\n\nEndpoints:\n{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        match available {
            Some(true) => "attached",
            Some(false) => "unavailable",
            None => "attaching",
        },
        format_list(&enabled_groups(&config)),
    );

    if !handler_names.is_empty() {
        println!("\nHeap dump handlers:\n{}", format_list(&handler_names));
    }

    if let Err(e) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await
    {
        error!(error=%e, "server error");
    }

    info!("shutting down");

    shutdown_tracer();

    Ok(())
}

/// Run capability detection on a blocking thread, waiting at most `limit`.
///
/// `None` means detection is still running. It carries on in the background
/// and the probe caches whatever it finds.
async fn warm_up(probe: Arc<CapabilityProbe>, limit: Duration) -> Option<bool> {
    let detection = task::spawn_blocking(move || probe.is_available());

    match tokio::time::timeout(limit, detection).await {
        Ok(Ok(available)) => Some(available),
        Ok(Err(e)) => {
            error!("Capability probe failed: {e}");
            Some(false)
        }
        Err(_) => None,
    }
}

async fn bind(port: u16, listen: Option<String>) -> Result<(TcpListener, String)> {
    if let Some(addr) = listen {
        let ip = addr.parse::<IpAddr>().map_err(|_| {
            anyhow!(
                "Invalid IP address: '{addr}'. Expected IPv4 (e.g., 0.0.0.0, 127.0.0.1) or IPv6 (e.g., ::, ::1)"
            )
        })?;

        let bind_addr = format!("{ip}:{port}");
        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {bind_addr}"))?;

        let display = if ip.is_ipv6() {
            format!("[{ip}]:{port}")
        } else {
            bind_addr
        };

        return Ok((listener, display));
    }

    // Auto: try IPv6 first, fallback to IPv4
    match TcpListener::bind(format!("::0:{port}")).await {
        Ok(l) => Ok((l, format!("[::]:{port}"))),
        Err(_) => Ok((
            TcpListener::bind(format!("0.0.0.0:{port}"))
                .await
                .with_context(|| format!("Failed to bind to 0.0.0.0:{port}"))?,
            format!("0.0.0.0:{port}"),
        )),
    }
}

fn enabled_groups(config: &DiagnosticsConfig) -> Vec<&'static str> {
    let mut groups = vec!["/health", "/metrics"];
    if config.heapdump_enabled {
        groups.push("/heapdump");
    }
    if config.jvmdiagnostics_enabled {
        groups.push("/jvmdiagnostics");
    }
    groups
}

// Helper to format a list of items with a leading dash and indentation for the
// start up message
fn format_list<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| format!("  - {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn make_span(request: &Request<Body>) -> Span {
    let parent_cx =
        global::get_text_map_propagator(|prop| prop.extract(&HeaderExtractor(request.headers())));

    let header = |name: &str, fallback: &'static str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(fallback)
            .to_string()
    };

    let span = info_span!(
        "http.server.request",
        otel.kind = "server",
        otel.status_code = tracing::field::Empty,
        http.method = request.method().as_str(),
        http.route = request.uri().path(),
        http.target = %request.uri(),
        http.scheme = request.uri().scheme_str().unwrap_or("http"),
        http.user_agent = %header("user-agent", "unknown"),
        request_id = %header("x-request-id", "none"),
    );

    let _ = span.set_parent(parent_cx);

    span
}

fn on_response<B>(response: &axum::http::Response<B>, latency: Duration, span: &Span) {
    if response.status().is_server_error() {
        span.record("otel.status_code", "ERROR");
    } else {
        span.record("otel.status_code", "OK");
    }

    let elapsed_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
    let trace_id = span.context().span().span_context().trace_id();

    if trace_id == TraceId::INVALID {
        info!(
            parent: span,
            status = response.status().as_u16(),
            elapsed_ms,
            "request completed"
        );
    } else {
        info!(
            parent: span,
            status = response.status().as_u16(),
            elapsed_ms,
            trace_id = %trace_id,
            "request completed"
        );
    }
}

async fn add_trace_headers(req: Request<Body>, next: Next) -> Response {
    let mut res = next.run(req).await;

    // clone the SpanContext, the Context is a temporary
    let span_context = Span::current().context().span().span_context().clone();

    if span_context.is_valid()
        && let Ok(val) = HeaderValue::from_str(&span_context.trace_id().to_string())
    {
        res.headers_mut()
            .insert(HeaderName::from_static("x-trace-id"), val);
    }

    res
}
