#![allow(dead_code)]

use axum::{Router, body::Body, http::Request, response::Response};
use flate2::read::GzDecoder;
use jvm_diag_exporter::{
    diagnostics::{
        CapabilityHandle, CapabilityProbe, DiagnosticCommand, DiagnosticFacility,
        DiagnosticsConfig, DiagnosticsError, DumpMode,
    },
    exporter::{Services, router},
};
use std::{
    fs,
    io::Read,
    path::Path,
    sync::{
        Arc, Condvar, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tower::ServiceExt;

pub const HEAP_CONTENT: &[u8] = b"JAVA PROFILE 1.0.2\0fake heap contents";

pub const HISTOGRAM: &str = " num     #instances         #bytes  class name
----------------------------------------------
   1:         23780        1906392  [B
   2:          2400         300432  java.lang.Class
Total         26180        2206824
";

pub const THREAD_DUMP: &str = "2024-05-01 10:00:00
Full thread dump OpenJDK 64-Bit Server VM (21.0.2+13-LTS mixed mode):

\"main\" #1 prio=5 os_prio=0 cpu=120.00ms elapsed=3.00s tid=0x00007f runnable
";

/// Holds a heap capture until released, so a second request can race it.
#[derive(Default)]
pub struct Gate {
    entered: AtomicBool,
    open: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn pass(&self) {
        self.entered.store(true, Ordering::SeqCst);
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cond.wait(open).unwrap();
        }
    }

    pub fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.cond.notify_all();
    }

    pub async fn wait_entered(&self) {
        for _ in 0..200 {
            if self.entered.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("heap capture never started");
    }
}

/// Stand-in for a JVM: writes a small file for heap dumps and answers
/// commands with canned output.
#[derive(Default)]
pub struct FakeFacility {
    pub dumps: Mutex<Vec<DumpMode>>,
    pub heap: Option<Vec<u8>>,
    pub histogram: Option<&'static str>,
    pub fail_capture: bool,
    pub gate: Option<Arc<Gate>>,
}

impl FakeFacility {
    pub fn new() -> Self {
        Self {
            histogram: Some(HISTOGRAM),
            ..Self::default()
        }
    }
}

impl DiagnosticFacility for FakeFacility {
    fn dump_heap(&self, path: &Path, mode: DumpMode) -> Result<(), DiagnosticsError> {
        if let Some(gate) = &self.gate {
            gate.pass();
        }
        self.dumps.lock().unwrap().push(mode);

        if self.fail_capture {
            return Err(DiagnosticsError::CaptureFailure {
                message: "attach refused".to_string(),
            });
        }

        let heap = self.heap.as_deref().unwrap_or(HEAP_CONTENT);
        fs::write(path, heap).map_err(DiagnosticsError::StreamFailure)
    }

    fn execute(&self, command: DiagnosticCommand) -> Result<String, DiagnosticsError> {
        match command {
            DiagnosticCommand::ClassHistogram => self.histogram.map(str::to_string).ok_or_else(|| {
                DiagnosticsError::CommandFailure {
                    command: command.jcmd_name(),
                    message: "no histogram".to_string(),
                }
            }),
            DiagnosticCommand::ThreadPrint => Ok(THREAD_DUMP.to_string()),
        }
    }
}

/// Incompressible bytes, so the gzip artifact is about as large as the heap.
pub fn noise(len: usize) -> Vec<u8> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            state.to_be_bytes()[0]
        })
        .collect()
}

pub fn available(facility: FakeFacility) -> (Arc<CapabilityProbe>, Arc<FakeFacility>) {
    let facility = Arc::new(facility);
    let probe = CapabilityProbe::resolved(CapabilityHandle::available(
        Arc::clone(&facility) as Arc<dyn DiagnosticFacility>
    ));
    (Arc::new(probe), facility)
}

pub fn unavailable() -> Arc<CapabilityProbe> {
    Arc::new(CapabilityProbe::resolved(CapabilityHandle::unavailable()))
}

pub fn app(probe: Arc<CapabilityProbe>, config: &DiagnosticsConfig) -> Router {
    let services = Services::new(probe, config).unwrap();
    router(services, config)
}

pub async fn send(app: &Router, method: &str, uri: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out).unwrap();
    out
}

pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Streaming downloads remove the dump just after the body ends.
pub async fn wait_until_empty(dir: &Path) -> bool {
    for _ in 0..100 {
        if dir_entries(dir).is_empty() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// Find an available port for testing (returns port > 1024)
pub fn get_available_port() -> u16 {
    use std::net::TcpListener;

    // Bind to port 0 lets the OS assign an available ephemeral port
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port");
    let port = listener
        .local_addr()
        .expect("Failed to get local addr")
        .port();

    assert!(port > 1024, "Assigned port {port} should be > 1024");

    port
}

/// Wait for server to be ready on the given port, polling every 100ms
pub async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    use tokio::time::sleep;

    for attempt in 1..=max_attempts {
        if tokio::net::TcpStream::connect(format!("127.0.0.1:{port}"))
            .await
            .is_ok()
        {
            return true;
        }

        if attempt % 10 == 0 {
            eprintln!("Still waiting for server on port {port} (attempt {attempt}/{max_attempts})");
        }

        sleep(Duration::from_millis(100)).await;
    }

    eprintln!("Failed to connect to server on port {port} after {max_attempts} attempts");
    false
}

/// Get base URL for test server
pub fn get_test_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}

/// A PID no live process uses.
pub const MISSING_PID: u32 = u32::MAX - 1;
