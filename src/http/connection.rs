use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::http::parser::{find_headers_end, parse_http_request_with_limits, ParseError, ParseLimits};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;
use crate::proxy::pipeline::Pipeline;

pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: Vec<u8>,
    state: ConnectionState,
    pipeline: Arc<Pipeline>,
    limits: ParseLimits,
    continue_sent: bool,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(ResponseWriter, bool), // bool = keep_alive?
    Closed,
}

enum ReadOutcome {
    Request(Request),
    Rejected(Response),
    Eof,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, pipeline: Arc<Pipeline>) -> Self {
        let limits = ParseLimits {
            max_body_bytes: pipeline.config().max_body_bytes,
            ..ParseLimits::default()
        };

        Self {
            stream,
            peer,
            buffer: Vec::with_capacity(4096),
            state: ConnectionState::Reading,
            pipeline,
            limits,
            continue_sent: false,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            self.state = match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => match self.read_request().await? {
                    ReadOutcome::Request(req) => ConnectionState::Processing(req),
                    ReadOutcome::Rejected(mut response) => {
                        response.headers.insert("Connection", "close");
                        ConnectionState::Writing(ResponseWriter::new(&response), false)
                    }
                    ReadOutcome::Eof => ConnectionState::Closed,
                },

                ConnectionState::Processing(req) => {
                    let keep_alive = req.keep_alive();

                    match self.dispatch(req).await {
                        Some(mut response) => {
                            let connection = if keep_alive { "keep-alive" } else { "close" };
                            response.headers.insert("Connection", connection);
                            ConnectionState::Writing(ResponseWriter::new(&response), keep_alive)
                        }
                        None => ConnectionState::Closed,
                    }
                }

                ConnectionState::Writing(mut writer, keep_alive) => {
                    writer.write_to_stream(&mut self.stream).await?;

                    if keep_alive {
                        ConnectionState::Reading // go back for next request
                    } else {
                        ConnectionState::Closed
                    }
                }

                ConnectionState::Closed => break,
            };
        }

        Ok(())
    }

    /// Runs the request through the pipeline while watching the client.
    ///
    /// Returns `None` when the client hangs up first, or when it pipelines
    /// more than one maximal request's worth of bytes meanwhile. Dropping the
    /// pipeline future closes any outbound connection it holds.
    async fn dispatch(&mut self, request: Request) -> Option<Response> {
        let pipeline = Arc::clone(&self.pipeline);
        let dispatch = pipeline.dispatch(request, self.peer);
        tokio::pin!(dispatch);

        let max_pending = self.limits.max_header_bytes.saturating_add(self.limits.max_body_bytes);

        let mut chunk = [0u8; 1024];
        loop {
            tokio::select! {
                response = &mut dispatch => return Some(response),
                read = self.stream.read(&mut chunk) => match read {
                    Ok(0) | Err(_) => {
                        debug!(peer = %self.peer, "Client disconnected before the response was ready");
                        return None;
                    }
                    Ok(n) if self.buffer.len() + n > max_pending => {
                        warn!(
                            peer = %self.peer,
                            limit = max_pending,
                            "Client sent too much data while a request was in flight"
                        );
                        return None;
                    }
                    // Pipelined bytes belong to the next request.
                    Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                },
            }
        }
    }

    async fn read_request(&mut self) -> anyhow::Result<ReadOutcome> {
        self.continue_sent = false;

        loop {
            // Try parsing whatever we already have
            match parse_http_request_with_limits(&self.buffer, self.limits) {
                Ok((request, consumed)) => {
                    self.buffer.drain(..consumed);
                    return Ok(ReadOutcome::Request(request));
                }

                Err(ParseError::Incomplete) => {
                    if !self.continue_sent && expects_continue(&self.buffer) {
                        self.stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
                        self.continue_sent = true;
                    }
                }

                Err(ParseError::BodyTooLarge) => {
                    warn!(peer = %self.peer, limit = self.limits.max_body_bytes, "Request body exceeds limit");
                    return Ok(ReadOutcome::Rejected(Response::payload_too_large()));
                }

                Err(e) => {
                    warn!(peer = %self.peer, error = ?e, "Malformed HTTP request");
                    return Ok(ReadOutcome::Rejected(Response::bad_request()));
                }
            }

            let mut temp = [0u8; 4096];
            let n = self.stream.read(&mut temp).await?;

            if n == 0 {
                if !self.buffer.is_empty() {
                    debug!(peer = %self.peer, pending = self.buffer.len(), "Client closed mid-request");
                }
                return Ok(ReadOutcome::Eof);
            }

            self.buffer.extend_from_slice(&temp[..n]);
        }
    }
}

fn expects_continue(buf: &[u8]) -> bool {
    let Some(end) = find_headers_end(buf) else {
        return false;
    };
    String::from_utf8_lossy(&buf[..end])
        .split("\r\n")
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .any(|(key, value)| {
            key.trim().eq_ignore_ascii_case("Expect") && value.trim().eq_ignore_ascii_case("100-continue")
        })
}
