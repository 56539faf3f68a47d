//! Shared helpers for the integration tests: a raw HTTP client, scripted
//! destination servers and proxy setup.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use proxilate::config::ProxyConfig;
use proxilate::http::headers::Headers;
use proxilate::http::parser::{ParseError, find_headers_end, parse_header_lines, parse_http_request};
use proxilate::http::request::Request;
use proxilate::http::response::Response;
use proxilate::http::writer::serialize_response;
use proxilate::server::Proxilate;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

pub const WAIT: Duration = Duration::from_secs(5);

/// Loopback config with an ephemeral port.
pub fn local_config() -> ProxyConfig {
    ProxyConfig {
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        ..ProxyConfig::default()
    }
}

pub async fn start_proxy(config: ProxyConfig) -> (Proxilate, SocketAddr) {
    let proxy = Proxilate::new(config).unwrap();
    let addr = proxy.start().await.unwrap();
    (proxy, addr)
}

#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Reads one Content-Length framed response.
pub async fn read_response<S: AsyncRead + Unpin>(stream: &mut S) -> RawResponse {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        if let Some(end) = find_headers_end(&buf) {
            let head = std::str::from_utf8(&buf[..end]).unwrap();
            let mut lines = head.split("\r\n");
            let status = lines
                .next()
                .and_then(|line| line.split(' ').nth(1))
                .and_then(|code| code.parse().ok())
                .unwrap();
            let headers = parse_header_lines(lines).unwrap();
            let length: usize = headers
                .get("Content-Length")
                .map(|value| value.parse().unwrap())
                .unwrap_or(0);

            let body_start = end + 4;
            if buf.len() >= body_start + length {
                let body = buf[body_start..body_start + length].to_vec();
                return RawResponse { status, headers, body };
            }
        }

        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before a full response arrived");
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Sends raw request bytes on a fresh connection and reads the response.
pub async fn send_raw(addr: SocketAddr, raw: &[u8]) -> RawResponse {
    let exchange = async {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();
        read_response(&mut stream).await
    };
    tokio::time::timeout(WAIT, exchange)
        .await
        .expect("proxy did not answer in time")
}

pub fn format_request(method: &str, target: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut raw = format!("{method} {target} HTTP/1.1\r\nHost: proxy.test\r\nConnection: close\r\n");
    for (key, value) in headers {
        raw.push_str(&format!("{key}: {value}\r\n"));
    }
    if !body.is_empty() {
        raw.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    raw.push_str("\r\n");

    let mut raw = raw.into_bytes();
    raw.extend_from_slice(body);
    raw
}

pub async fn get(addr: SocketAddr, target: &str, headers: &[(&str, &str)]) -> RawResponse {
    send_raw(addr, &format_request("GET", target, headers, b"")).await
}

type Handler = Arc<dyn Fn(&Request) -> Response + Send + Sync>;

/// A destination server that answers every request with `handler` and
/// reports what it received.
pub struct MockBackend {
    pub addr: SocketAddr,
    requests: mpsc::UnboundedReceiver<Request>,
    connections: Arc<AtomicUsize>,
}

impl MockBackend {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler: Handler = Arc::new(handler);
        let (tx, requests) = mpsc::unbounded_channel();
        let connections = Arc::new(AtomicUsize::new(0));

        let accepted = Arc::clone(&connections);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                accepted.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(socket, Arc::clone(&handler), tx.clone()));
            }
        });

        Self {
            addr,
            requests,
            connections,
        }
    }

    /// Answers `200 OK` with body `backend`.
    pub async fn ok() -> Self {
        Self::start(|_| Response::ok("backend")).await
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn next_request(&mut self) -> Request {
        tokio::time::timeout(WAIT, self.requests.recv())
            .await
            .expect("destination was never contacted")
            .unwrap()
    }

    pub fn try_next_request(&mut self) -> Option<Request> {
        self.requests.try_recv().ok()
    }

    /// Connections accepted so far, whether or not a request followed.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn serve(mut socket: TcpStream, handler: Handler, tx: mpsc::UnboundedSender<Request>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let request = loop {
        match parse_http_request(&buf) {
            Ok((request, _)) => break request,
            Err(ParseError::Incomplete) => {}
            Err(_) => return,
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let response = handler(&request);
    let _ = tx.send(request);
    let _ = socket.write_all(&serialize_response(&response)).await;
    let _ = socket.shutdown().await;
}

/// A destination that accepts connections and never answers. Each time the
/// proxy closes one, `closed` receives a message.
pub struct SilentBackend {
    pub addr: SocketAddr,
    closed: mpsc::UnboundedReceiver<()>,
}

impl SilentBackend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, closed) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut chunk = [0u8; 4096];
                    while let Ok(n) = socket.read(&mut chunk).await {
                        if n == 0 {
                            break;
                        }
                    }
                    let _ = tx.send(());
                });
            }
        });

        Self { addr, closed }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn wait_closed(&mut self) {
        tokio::time::timeout(WAIT, self.closed.recv())
            .await
            .expect("proxy kept the destination connection open")
            .unwrap();
    }
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
