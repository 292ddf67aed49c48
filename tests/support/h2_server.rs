//! Cleartext HTTP/2 server that resets streams mid-body.
//!
//! Reproduces hosts that answer with `RST_STREAM(INTERNAL_ERROR)` partway
//! through a response. Clients must connect with HTTP/2 prior knowledge.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use h2::server::SendResponse;
use h2::{Reason, RecvStream};
use http::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use http::{Method, Request, Response, StatusCode};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use super::flaky_server::SeenRequest;
use super::socket_guard::should_skip_socket_bound_test;

/// How the server misbehaves.
#[derive(Debug, Clone, Copy)]
pub struct ResetPlan {
    /// Body bytes sent before the reset.
    pub cut_after: usize,
    /// Number of GETs that get reset.
    pub failures: usize,
    /// Send `Accept-Ranges: bytes` on HEAD.
    pub advertise_ranges: bool,
    /// Answer `Range` requests with 206. When false, every GET gets the full 200.
    pub honor_ranges: bool,
}

#[derive(Debug)]
struct Shared {
    body: Vec<u8>,
    plan: ResetPlan,
    failures_left: AtomicUsize,
    seen: Mutex<Vec<SeenRequest>>,
}

pub struct ResetServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl ResetServer {
    /// Starts the server, or returns `None` when sockets are unavailable.
    pub async fn start_or_skip(body: Vec<u8>, plan: ResetPlan) -> Option<Self> {
        if should_skip_socket_bound_test() {
            return None;
        }
        let listener = TcpListener::bind("127.0.0.1:0").await.ok()?;
        let addr = listener.local_addr().ok()?;
        let shared = Arc::new(Shared {
            body,
            plan,
            failures_left: AtomicUsize::new(plan.failures),
            seen: Mutex::new(Vec::new()),
        });

        let accept_shared = Arc::clone(&shared);
        let handle = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(socket, Arc::clone(&accept_shared)));
            }
        });

        Some(Self {
            addr,
            shared,
            handle,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// GET requests seen so far, in arrival order.
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.shared
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for ResetServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(socket: TcpStream, shared: Arc<Shared>) {
    let Ok(mut connection) = h2::server::handshake(socket).await else {
        return;
    };
    // Polling `accept` also drives the connection's I/O for open streams.
    while let Some(Ok((request, respond))) = connection.accept().await {
        tokio::spawn(respond_to(request, respond, Arc::clone(&shared)));
    }
}

async fn respond_to(
    request: Request<RecvStream>,
    mut respond: SendResponse<Bytes>,
    shared: Arc<Shared>,
) {
    let total = shared.body.len();
    let plan = shared.plan;

    if request.method() == Method::HEAD {
        let mut head = Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_LENGTH, total);
        if plan.advertise_ranges {
            head = head.header(ACCEPT_RANGES, "bytes");
        }
        if let Ok(head) = head.body(()) {
            let _ = respond.send_response(head, true);
        }
        return;
    }

    let range = request
        .headers()
        .get(RANGE)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);
    shared
        .seen
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(SeenRequest {
            path: request.uri().path().to_string(),
            range: range.clone(),
        });

    let start = range
        .as_deref()
        .filter(|_| plan.honor_ranges)
        .and_then(|value| value.strip_prefix("bytes="))
        .and_then(|value| value.split('-').next())
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|start| *start < total);

    let (head, body) = match start {
        Some(start) => (
            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(CONTENT_LENGTH, total - start)
                .header(CONTENT_RANGE, format!("bytes {start}-{}/{total}", total - 1)),
            Bytes::copy_from_slice(&shared.body[start..]),
        ),
        None => (
            Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_LENGTH, total),
            Bytes::copy_from_slice(&shared.body),
        ),
    };
    let Ok(head) = head.body(()) else {
        return;
    };
    let Ok(mut stream) = respond.send_response(head, false) else {
        return;
    };

    let fail = shared
        .failures_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok();
    if !fail {
        let _ = stream.send_data(body, true);
        return;
    }

    let cut = plan.cut_after.min(body.len());
    let _ = stream.send_data(body.slice(..cut), false);
    // A reset discards frames still queued for the stream, so let the data go first.
    tokio::time::sleep(Duration::from_millis(50)).await;
    stream.send_reset(Reason::INTERNAL_ERROR);
}
