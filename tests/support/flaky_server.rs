//! Minimal HTTP/1.1 server that drops connections mid-body.
//!
//! wiremock always sends complete bodies, so interrupted transfers need a
//! server that advertises a `Content-Length` and then closes early.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use super::socket_guard::should_skip_socket_bound_test;

/// One `GET` the server received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub path: String,
    pub range: Option<String>,
}

#[derive(Debug)]
struct Shared {
    body: Vec<u8>,
    cut_after: usize,
    failures_left: AtomicUsize,
    resumable: bool,
    seen: Mutex<Vec<SeenRequest>>,
}

/// Serves one body at every path. The first `failures` GETs send full
/// headers but only `cut_after` body bytes before closing the socket.
pub struct FlakyServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl FlakyServer {
    /// Starts the server, or returns `None` when sockets are unavailable.
    pub async fn start_or_skip(
        body: Vec<u8>,
        cut_after: usize,
        failures: usize,
        resumable: bool,
    ) -> Option<Self> {
        if should_skip_socket_bound_test() {
            return None;
        }
        let listener = TcpListener::bind("127.0.0.1:0").await.ok()?;
        let addr = listener.local_addr().ok()?;
        let shared = Arc::new(Shared {
            body,
            cut_after,
            failures_left: AtomicUsize::new(failures),
            resumable,
            seen: Mutex::new(Vec::new()),
        });

        let accept_shared = Arc::clone(&shared);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&accept_shared)));
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

impl Drop for FlakyServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, shared: Arc<Shared>) {
    let Some(head) = read_head(&mut stream).await else {
        return;
    };
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or("/").to_string();
    let range = lines.find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("range")
            .then(|| value.trim().to_string())
    });

    let total = shared.body.len();
    let accept_ranges = if shared.resumable {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };

    if method == "HEAD" {
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {total}\r\n{accept_ranges}Connection: close\r\n\r\n"
        );
        let _ = stream.write_all(head.as_bytes()).await;
        let _ = stream.shutdown().await;
        return;
    }

    shared
        .seen
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(SeenRequest {
            path,
            range: range.clone(),
        });

    let start = range
        .as_deref()
        .filter(|_| shared.resumable)
        .and_then(|value| value.strip_prefix("bytes="))
        .and_then(|value| value.split('-').next())
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|start| *start < total);

    let (head, body) = match start {
        Some(start) => (
            format!(
                "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Range: bytes {start}-{}/{total}\r\n{accept_ranges}Connection: close\r\n\r\n",
                total - start,
                total - 1
            ),
            &shared.body[start..],
        ),
        None => (
            format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {total}\r\n{accept_ranges}Connection: close\r\n\r\n"
            ),
            &shared.body[..],
        ),
    };

    let fail = shared
        .failures_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok();
    let body = if fail {
        &body[..shared.cut_after.min(body.len())]
    } else {
        body
    };

    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(body).await;
    let _ = stream.flush().await;
    let _ = stream.shutdown().await;
}

async fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0_u8; 512];
    while !buf.windows(4).any(|window| window == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 || buf.len() > 16 * 1024 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Some(String::from_utf8_lossy(&buf).into_owned())
}
