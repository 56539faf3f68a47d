use crate::http::headers::Headers;
use crate::http::request::{Method, Request};

/// Largest header block accepted before the request is rejected.
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    InvalidRequest,
    InvalidMethod,
    InvalidHeader,
    InvalidContentLength,
    InvalidChunk,
    HeadersTooLarge,
    BodyTooLarge,
    Incomplete,
}

/// Size limits applied while parsing a request.
#[derive(Debug, Clone, Copy)]
pub struct ParseLimits {
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_header_bytes: MAX_HEADER_BYTES,
            max_body_bytes: usize::MAX,
        }
    }
}

/// Parses one request from the front of `buf` with default limits.
///
/// On success returns the request and the number of bytes it occupied.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    parse_http_request_with_limits(buf, ParseLimits::default())
}

pub fn parse_http_request_with_limits(
    buf: &[u8],
    limits: ParseLimits,
) -> Result<(Request, usize), ParseError> {
    // Look for header/body separator
    let headers_end = match find_headers_end(buf) {
        Some(end) => end,
        None if buf.len() > limits.max_header_bytes => return Err(ParseError::HeadersTooLarge),
        None => return Err(ParseError::Incomplete),
    };
    if headers_end > limits.max_header_bytes {
        return Err(ParseError::HeadersTooLarge);
    }

    let header_bytes = &buf[..headers_end];
    let body_bytes = &buf[headers_end + 4..];

    let headers_str = std::str::from_utf8(header_bytes).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let path = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;
    if parts.next().is_some() || !version.starts_with("HTTP/") {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::parse(method_str).ok_or(ParseError::InvalidMethod)?;
    let headers = parse_header_lines(lines)?;

    // Body
    let (body, body_consumed) = if headers.has_token("Transfer-Encoding", "chunked") {
        decode_chunked(body_bytes, limits.max_body_bytes)?
    } else {
        let content_length = content_length(&headers)?.unwrap_or(0);
        if content_length > limits.max_body_bytes {
            return Err(ParseError::BodyTooLarge);
        }
        if body_bytes.len() < content_length {
            return Err(ParseError::Incomplete);
        }
        (body_bytes[..content_length].to_vec(), content_length)
    };

    let request = Request {
        method,
        path: path.to_string(),
        version: version.to_string(),
        headers,
        body,
    };

    Ok((request, headers_end + 4 + body_consumed))
}

/// Parses `Name: value` lines until the first empty line.
pub fn parse_header_lines<'a>(
    lines: impl Iterator<Item = &'a str>,
) -> Result<Headers, ParseError> {
    let mut headers = Headers::new();

    for line in lines {
        if line.is_empty() {
            break;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(ParseError::InvalidHeader);
        }

        headers.append(key, value.trim());
    }

    Ok(headers)
}

/// Reads `Content-Length`; repeated fields must agree.
pub fn content_length(headers: &Headers) -> Result<Option<usize>, ParseError> {
    let mut found = None;
    for value in headers.get_all("Content-Length") {
        let parsed = value
            .trim()
            .parse::<usize>()
            .map_err(|_| ParseError::InvalidContentLength)?;
        match found {
            Some(previous) if previous != parsed => return Err(ParseError::InvalidContentLength),
            _ => found = Some(parsed),
        }
    }
    Ok(found)
}

/// Decodes a complete chunked body from the front of `buf`.
///
/// Returns the de-chunked payload and the number of bytes consumed, including
/// the terminating chunk and any trailer fields (which are discarded).
pub fn decode_chunked(buf: &[u8], max_body: usize) -> Result<(Vec<u8>, usize), ParseError> {
    let mut body = Vec::new();
    let mut pos = 0;

    loop {
        let line_len = find_crlf(&buf[pos..]).ok_or(ParseError::Incomplete)?;
        let line = std::str::from_utf8(&buf[pos..pos + line_len]).map_err(|_| ParseError::InvalidChunk)?;
        let size_field = line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_field, 16).map_err(|_| ParseError::InvalidChunk)?;
        pos += line_len + 2;

        if size == 0 {
            loop {
                let trailer_len = find_crlf(&buf[pos..]).ok_or(ParseError::Incomplete)?;
                pos += trailer_len + 2;
                if trailer_len == 0 {
                    return Ok((body, pos));
                }
            }
        }

        if body.len().saturating_add(size) > max_body {
            return Err(ParseError::BodyTooLarge);
        }

        let data_end = pos.checked_add(size).ok_or(ParseError::InvalidChunk)?;
        if buf.len() < data_end + 2 {
            return Err(ParseError::Incomplete);
        }
        if &buf[data_end..data_end + 2] != b"\r\n" {
            return Err(ParseError::InvalidChunk);
        }

        body.extend_from_slice(&buf[pos..data_end]);
        pos = data_end + 2;
    }
}

pub fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}
