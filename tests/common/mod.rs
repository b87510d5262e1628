//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use balancing_proxy::http::server;
use balancing_proxy::{EndPoint, Handler, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct Received {
    /// Request line and headers, without the terminating blank line.
    pub head: String,
    /// Number of body bytes read, after chunked decoding.
    pub body_len: usize,
}

impl Received {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    /// First value of a header, name matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }
}

/// Read one request from the socket. `None` when the peer closed the connection.
pub async fn read_request(socket: &mut TcpStream) -> Option<Received> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut received = Received { head, body_len: 0 };

    let chunked = received
        .header("transfer-encoding")
        .is_some_and(|v| v.eq_ignore_ascii_case("chunked"));
    if chunked {
        let mut body = buf[head_end + 4..].to_vec();
        loop {
            if let Some(len) = chunked_len(&body) {
                received.body_len = len;
                return Some(received);
            }
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            body.extend_from_slice(&chunk[..n]);
        }
    }

    let content_length: usize = received
        .header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut body_len = buf.len() - (head_end + 4);
    while body_len < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        body_len += n;
    }
    received.body_len = body_len;
    Some(received)
}

/// Decoded length of a complete chunked body, `None` while incomplete.
fn chunked_len(mut body: &[u8]) -> Option<usize> {
    let mut total = 0;
    loop {
        let line_end = body.windows(2).position(|w| w == b"\r\n")?;
        let size_line = std::str::from_utf8(&body[..line_end]).ok()?;
        let size_hex = size_line.split(';').next()?.trim();
        let size = usize::from_str_radix(size_hex, 16).ok()?;
        body = &body[line_end + 2..];

        if size == 0 {
            // Trailers are not used by the proxy; expect the final blank line.
            return body.starts_with(b"\r\n").then_some(total);
        }
        if body.len() < size + 2 {
            return None;
        }
        total += size;
        body = &body[size + 2..];
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        201 => "201 Created",
        302 => "302 Found",
        404 => "404 Not Found",
        418 => "418 I'm a teapot",
        500 => "500 Internal Server Error",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a simple mock backend that returns a fixed response.
pub async fn start_mock_backend(addr: SocketAddr, response: &'static str) {
    start_programmable_backend(addr, move |_| async move {
        (200, vec![("Content-Type".to_string(), "text/plain".to_string())], response.to_string())
    })
    .await;
}

/// Start a backend answering each request with `(status, headers, body)` from `f`.
/// Connections are closed after each response.
pub async fn start_programmable_backend<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn(Received) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, Vec<(String, String)>, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let Some(received) = read_request(&mut socket).await else {
                    return;
                };
                let (status, headers, body) = f(received).await;

                let mut response = format!("HTTP/1.1 {}\r\n", status_text(status));
                for (name, value) in headers {
                    response.push_str(&format!("{}: {}\r\n", name, value));
                }
                response.push_str(&format!(
                    "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                ));
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
}

/// Start a keep-alive backend answering `ok` to every request.
/// Returns the number of accepted connections.
pub async fn start_keepalive_backend(addr: SocketAddr) -> Arc<AtomicUsize> {
    let listener = TcpListener::bind(addr).await.unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                while read_request(&mut socket).await.is_some() {
                    let response = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";
                    if socket.write_all(response.as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    connections
}

/// Start a backend that reads requests but never answers.
pub async fn start_silent_backend(addr: SocketAddr) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = read_request(&mut socket).await;
                tokio::time::sleep(Duration::from_secs(60)).await;
                drop(socket);
            });
        }
    });
}

/// Start a backend that sends headers and `sent` of `promised` body bytes, then stalls.
pub async fn start_stalling_backend(addr: SocketAddr, promised: usize, sent: usize) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                if read_request(&mut socket).await.is_none() {
                    return;
                }
                let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", promised);
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&vec![b'x'; sent]).await;
                tokio::time::sleep(Duration::from_secs(60)).await;
                drop(socket);
            });
        }
    });
}

/// Start a backend streaming a body of `size` bytes in 64 KiB writes.
/// Returns the number of body bytes written so far.
pub async fn start_large_body_backend(addr: SocketAddr, size: usize) -> Arc<AtomicUsize> {
    let listener = TcpListener::bind(addr).await.unwrap();
    let written = Arc::new(AtomicUsize::new(0));
    let counter = written.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let counter = counter.clone();
            tokio::spawn(async move {
                if read_request(&mut socket).await.is_none() {
                    return;
                }
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    size
                );
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                let chunk = vec![b'z'; 64 * 1024];
                let mut remaining = size;
                while remaining > 0 {
                    let n = remaining.min(chunk.len());
                    if socket.write_all(&chunk[..n]).await.is_err() {
                        return;
                    }
                    counter.fetch_add(n, Ordering::SeqCst);
                    remaining -= n;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    written
}

/// Serve `handler` on a plaintext endpoint at `addr` until `shutdown` triggers.
pub async fn start_proxy(addr: SocketAddr, handler: Arc<dyn Handler>, shutdown: &Shutdown) {
    let listener = TcpListener::bind(addr).await.unwrap();
    let endpoint = EndPoint::new(addr.ip(), addr.port(), false);
    let signalled = shutdown.signalled();

    tokio::spawn(async move {
        let _ = server::serve(listener, endpoint, handler, signalled).await;
    });
}

/// Client without connection reuse, proxies or redirect following.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
