//! Forwarding engine: one outbound HTTP/1.1 exchange per proxied request.
//!
//! The engine connects to the target (over TLS for `https`), writes the
//! rewritten request, reads the whole response and hands it back for relay.
//! Connection-level failures come back as `ProxyError` values carrying the
//! gateway status the client should see.

use anyhow::{Context, Result, bail};
use bytes::BytesMut;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

use crate::error::ProxyError;
use crate::http::headers::Headers;
use crate::http::parser::{
    MAX_HEADER_BYTES, ParseError, content_length, decode_chunked, find_headers_end, parse_header_lines,
};
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::proxy::hooks::FetchOptions;
use crate::proxy::target::Scheme;

/// Default buffer size for reads
const BUFFER_SIZE: usize = 8192;

/// Headers that only describe the hop they arrived on.
const HOP_BY_HOP: &[&str] = &[
    "Connection",
    "Keep-Alive",
    "Proxy-Connection",
    "Proxy-Authorization",
    "TE",
    "Trailer",
    "Transfer-Encoding",
    "Upgrade",
];

/// Issues outbound requests and relays what comes back.
#[derive(Clone)]
pub struct ForwardingEngine {
    tls: TlsConnector,
    max_response_bytes: usize,
}

impl ForwardingEngine {
    /// Destination bodies larger than `max_response_bytes` fail with 502.
    pub fn new(tls: TlsConnector, max_response_bytes: usize) -> Self {
        Self {
            tls,
            max_response_bytes,
        }
    }

    /// Forward `request` as described by `options`.
    ///
    /// Destination responses of any status are `Ok`. Connect, DNS and TLS
    /// failures map to 502, a broken response to 502, and running past
    /// `options.timeout` to 504. On timeout the exchange future is dropped,
    /// which closes the outbound socket.
    pub async fn forward(&self, request: &Request, options: &FetchOptions) -> Result<Response, ProxyError> {
        let destination = options.target.display_url();

        tracing::debug!(
            destination = %destination,
            method = %request.method,
            timeout = ?options.timeout,
            "Forwarding request to destination"
        );

        match options.timeout {
            Some(limit) => timeout(limit, self.exchange(request, options, &destination))
                .await
                .map_err(|_| ProxyError::BackendTimeout {
                    destination: destination.clone(),
                    timeout: limit,
                })?,
            None => self.exchange(request, options, &destination).await,
        }
    }

    async fn exchange(
        &self,
        request: &Request,
        options: &FetchOptions,
        destination: &str,
    ) -> Result<Response, ProxyError> {
        let target = &options.target;
        let unreachable = |reason: String| ProxyError::BackendUnreachable {
            destination: destination.to_string(),
            reason,
        };

        let stream = TcpStream::connect((target.connect_host(), target.port))
            .await
            .map_err(|e| unreachable(e.to_string()))?;
        stream.set_nodelay(true).ok();

        tracing::trace!(destination, "Connected to destination");

        let payload = build_http_request(request, options);

        let result = match target.protocol {
            Scheme::Http => send_request_and_receive_response(stream, &payload, &request.method, self.max_response_bytes).await,
            Scheme::Https => {
                let server_name = ServerName::try_from(target.connect_host().to_string())
                    .map_err(|e| unreachable(e.to_string()))?;
                let tls_stream = self
                    .tls
                    .connect(server_name, stream)
                    .await
                    .map_err(|e| unreachable(format!("TLS handshake failed: {e}")))?;
                send_request_and_receive_response(tls_stream, &payload, &request.method, self.max_response_bytes)
                    .await
            }
        };

        result.map_err(|e| ProxyError::BackendProtocol {
            destination: destination.to_string(),
            reason: format!("{e:#}"),
        })
    }
}

/// Build HTTP request bytes to send to the destination
pub fn build_http_request(request: &Request, options: &FetchOptions) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(512 + request.body.len());

    // Request line
    buffer.extend_from_slice(
        format!("{} {} HTTP/1.1\r\n", request.method, options.target.path_and_query()).as_bytes(),
    );

    let mut headers = request.headers.clone();
    strip_hop_by_hop(&mut headers);

    if options.change_origin || !headers.contains("Host") {
        headers.insert("Host", options.target.host_header());
    }

    if let Some(auth) = &options.auth {
        headers.insert("Authorization", auth.to_basic_header());
    }

    // The body is fully buffered, so it always goes out with an exact length.
    headers.remove("Content-Length");
    if !request.body.is_empty() || matches!(request.method, Method::POST | Method::PUT | Method::PATCH) {
        headers.append("Content-Length", request.body.len().to_string());
    }

    headers.insert("Connection", "close");

    for (key, value) in headers.iter() {
        buffer.extend_from_slice(format!("{key}: {value}\r\n").as_bytes());
    }

    // End of headers
    buffer.extend_from_slice(b"\r\n");
    buffer.extend_from_slice(&request.body);

    buffer
}

fn strip_hop_by_hop(headers: &mut Headers) {
    let listed: Vec<String> = headers
        .get_all("Connection")
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .collect();

    for name in listed.iter().map(String::as_str).chain(HOP_BY_HOP.iter().copied()) {
        headers.remove(name);
    }
}

async fn send_request_and_receive_response<S>(
    mut stream: S,
    payload: &[u8],
    method: &Method,
    max_body: usize,
) -> Result<Response>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(payload).await.context("Failed to send request")?;
    stream.flush().await?;

    tracing::trace!(bytes = payload.len(), "Request sent to destination");

    read_http_response(&mut stream, method, max_body).await
}

/// Read HTTP response from the destination
async fn read_http_response<S>(stream: &mut S, method: &Method, max_body: usize) -> Result<Response>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);

    loop {
        let (status, headers) = read_response_head(stream, &mut buffer).await?;

        // Interim responses (100 Continue and friends) precede the real one.
        if (100..200).contains(&status.as_u16()) && status.as_u16() != 101 {
            tracing::trace!(status = status.as_u16(), "Skipping interim response");
            continue;
        }

        let has_body = *method != Method::HEAD && status.allows_body();
        let body = if has_body {
            read_response_body(stream, &mut buffer, &headers, max_body).await?
        } else {
            Vec::new()
        };

        return Ok(relay_response(status, headers, body, has_body));
    }
}

async fn read_response_head<S>(stream: &mut S, buffer: &mut BytesMut) -> Result<(StatusCode, Headers)>
where
    S: AsyncRead + Unpin,
{
    loop {
        if let Some(headers_end) = find_headers_end(buffer) {
            let head = buffer.split_to(headers_end + 4);
            return parse_response_head(&head[..headers_end]);
        }

        // Prevent unbounded header growth
        if buffer.len() > MAX_HEADER_BYTES {
            bail!("Response headers too large");
        }

        let n = stream.read_buf(buffer).await?;
        if n == 0 {
            bail!("Connection closed before complete response received");
        }
    }
}

/// Parse status line and headers
fn parse_response_head(head: &[u8]) -> Result<(StatusCode, Headers)> {
    let head = std::str::from_utf8(head).context("Invalid UTF-8 in response headers")?;
    let mut lines = head.split("\r\n");

    let status_line = lines.next().context("Empty response")?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        bail!("Invalid status line: {status_line}");
    }

    let code: u16 = parts
        .next()
        .context("Missing status code")?
        .parse()
        .context("Invalid status code")?;
    let status = StatusCode::from_u16(code).with_context(|| format!("Status code out of range: {code}"))?;

    let headers = parse_header_lines(lines).map_err(|e| anyhow::anyhow!("Invalid response header: {e:?}"))?;

    Ok((status, headers))
}

/// Read response body framed by chunking, Content-Length or connection close.
///
/// Bodies over `max_body` bytes are rejected without being read further.
async fn read_response_body<S>(
    stream: &mut S,
    buffer: &mut BytesMut,
    headers: &Headers,
    max_body: usize,
) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    if headers.has_token("Transfer-Encoding", "chunked") {
        // Bound on raw chunked bytes held while waiting for the next chunk.
        let max_raw = max_body.saturating_mul(2).saturating_add(MAX_HEADER_BYTES);
        loop {
            match decode_chunked(buffer, max_body) {
                Ok((body, _)) => return Ok(body),
                Err(ParseError::Incomplete) if buffer.len() > max_raw => {
                    bail!("Response body exceeds {max_body} bytes")
                }
                Err(ParseError::Incomplete) => {}
                Err(ParseError::BodyTooLarge) => bail!("Response body exceeds {max_body} bytes"),
                Err(e) => bail!("Invalid chunked body: {e:?}"),
            }

            if stream.read_buf(buffer).await? == 0 {
                bail!("Connection closed before complete body received");
            }
        }
    }

    let length = content_length(headers).map_err(|_| anyhow::anyhow!("Invalid Content-Length"))?;

    match length {
        Some(length) if length > max_body => {
            bail!("Response body of {length} bytes exceeds {max_body} bytes")
        }
        Some(length) => {
            while buffer.len() < length {
                if stream.read_buf(buffer).await? == 0 {
                    bail!("Connection closed before complete body received");
                }
            }
            Ok(buffer.split_to(length).to_vec())
        }
        None => {
            // No framing: the body runs until the destination closes.
            loop {
                match stream.read_buf(buffer).await {
                    Ok(0) => break,
                    Ok(_) if buffer.len() > max_body => bail!("Response body exceeds {max_body} bytes"),
                    Ok(_) => {}
                    // TLS peers that skip close_notify
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                    Err(e) => return Err(e.into()),
                }
            }
            if buffer.len() > max_body {
                bail!("Response body exceeds {max_body} bytes");
            }
            Ok(buffer.split().to_vec())
        }
    }
}

/// Prepare the destination response for the client: same status, headers
/// and body bytes, re-framed by Content-Length.
fn relay_response(status: StatusCode, mut headers: Headers, body: Vec<u8>, has_body: bool) -> Response {
    strip_hop_by_hop(&mut headers);

    if has_body {
        headers.insert("Content-Length", body.len().to_string());
    }

    Response { status, headers, body }
}
