//! Minimal HTTP stub standing in for the pipeline simulator.
//!
//! Binds an ephemeral local port and answers the simulator's four routes
//! with canned responses. Requests are counted per route so scenarios can
//! assert whether the harness went remote or fell back locally.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// One canned HTTP response.
#[allow(dead_code)]
#[derive(Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub body: String,
}

#[allow(dead_code)]
impl CannedResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_owned(),
        }
    }

    /// Successful 200 response in the simulator's execution shape.
    pub fn execution(execution_id: &str, status_word: &str, rows: u64) -> Self {
        Self::json(
            200,
            &format!(
                r#"{{"execution_id":"{execution_id}","status":"{status_word}","rows_processed":{rows}}}"#
            ),
        )
    }
}

/// Canned responses per simulator route.
#[allow(dead_code)]
#[derive(Clone)]
pub struct StubRoutes {
    pub health_status: u16,
    pub pipeline: CannedResponse,
    pub copy_activity: CannedResponse,
    pub execution_status: CannedResponse,
}

impl Default for StubRoutes {
    fn default() -> Self {
        Self {
            health_status: 200,
            pipeline: CannedResponse::execution("remote-pipeline", "SUCCESS", 0),
            copy_activity: CannedResponse::execution("remote-copy", "SUCCESS", 0),
            execution_status: CannedResponse::execution("remote-status", "SUCCESS", 0),
        }
    }
}

#[derive(Clone)]
struct RouteCounters {
    health: Arc<AtomicUsize>,
    pipeline: Arc<AtomicUsize>,
    copy_activity: Arc<AtomicUsize>,
    execution_status: Arc<AtomicUsize>,
}

impl RouteCounters {
    fn new() -> Self {
        Self {
            health: Arc::new(AtomicUsize::new(0)),
            pipeline: Arc::new(AtomicUsize::new(0)),
            copy_activity: Arc::new(AtomicUsize::new(0)),
            execution_status: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// In-process simulator stub on an ephemeral port.
///
/// The accept loop is aborted on drop.
#[allow(dead_code)]
pub struct StubSimulator {
    base_url: String,
    counters: RouteCounters,
    handle: JoinHandle<()>,
}

#[allow(dead_code)]
impl StubSimulator {
    /// Start a stub answering every route with SUCCESS.
    pub async fn start() -> Self {
        Self::with_routes(StubRoutes::default()).await
    }

    /// Start a stub with caller-chosen responses.
    pub async fn with_routes(routes: StubRoutes) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind stub listener");
        let addr = listener.local_addr().expect("stub listener has no address");
        let counters = RouteCounters::new();

        let accept_counters = counters.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let routes = routes.clone();
                let counters = accept_counters.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, routes, counters).await;
                });
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            counters,
            handle,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn health_requests(&self) -> usize {
        self.counters.health.load(Ordering::SeqCst)
    }

    pub fn pipeline_requests(&self) -> usize {
        self.counters.pipeline.load(Ordering::SeqCst)
    }

    pub fn copy_activity_requests(&self) -> usize {
        self.counters.copy_activity.load(Ordering::SeqCst)
    }

    pub fn execution_status_requests(&self) -> usize {
        self.counters.execution_status.load(Ordering::SeqCst)
    }
}

impl Drop for StubSimulator {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(
    mut stream: TcpStream,
    routes: StubRoutes,
    counters: RouteCounters,
) -> std::io::Result<()> {
    let request = read_request(&mut stream).await?;
    let (status, body) = match request_line(&request) {
        Some(("GET", "/")) => {
            counters.health.fetch_add(1, Ordering::SeqCst);
            (routes.health_status, String::new())
        }
        Some(("POST", "/pipeline-execution")) => {
            counters.pipeline.fetch_add(1, Ordering::SeqCst);
            (routes.pipeline.status, routes.pipeline.body)
        }
        Some(("POST", "/copy-activity")) => {
            counters.copy_activity.fetch_add(1, Ordering::SeqCst);
            (routes.copy_activity.status, routes.copy_activity.body)
        }
        Some(("GET", path)) if path.starts_with("/execution-status/") => {
            counters.execution_status.fetch_add(1, Ordering::SeqCst);
            (routes.execution_status.status, routes.execution_status.body)
        }
        _ => (404, String::new()),
    };
    write_response(&mut stream, status, &body).await
}

/// Read one request: headers, then a Content-Length body if present.
async fn read_request(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(header_end) = find_header_end(&buf) {
            let headers = String::from_utf8_lossy(&buf[..header_end]);
            let expected = content_length(&headers);
            if buf.len() - (header_end + 4) >= expected {
                break;
            }
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn content_length(headers: &str) -> usize {
    headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
        .unwrap_or(0)
}

fn request_line(request: &str) -> Option<(&str, &str)> {
    let line = request.lines().next()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let path = parts.next()?;
    Some((method, path))
}

async fn write_response(stream: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len(),
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}
