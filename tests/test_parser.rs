use proxilate::http::parser::{
    MAX_HEADER_BYTES, ParseError, ParseLimits, decode_chunked, parse_http_request,
    parse_http_request_with_limits,
};
use proxilate::http::request::Method;

#[test]
fn test_parse_simple_get_request() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.method, Method::GET);
    assert_eq!(parsed.path, "/");
    assert_eq!(parsed.version, "HTTP/1.1");
    assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_forward_request_target() {
    let req = b"GET /http://127.0.0.1:7000/some/path?q=1 HTTP/1.1\r\nHost: proxy\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.path, "/http://127.0.0.1:7000/some/path?q=1");
}

#[test]
fn test_parse_post_request_with_body() {
    let req = b"POST /api HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.method, Method::POST);
    assert_eq!(parsed.body, b"hello".to_vec());
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_pipelined_requests_consumes_only_first() {
    let first = b"GET /a HTTP/1.1\r\n\r\n".to_vec();
    let mut buf = first.clone();
    buf.extend_from_slice(b"GET /b HTTP/1.1\r\n\r\n");

    let (parsed, consumed) = parse_http_request(&buf).unwrap();

    assert_eq!(parsed.path, "/a");
    assert_eq!(consumed, first.len());
    let (second, _) = parse_http_request(&buf[consumed..]).unwrap();
    assert_eq!(second.path, "/b");
}

#[test]
fn test_parse_repeated_headers_keep_order() {
    let req = b"GET / HTTP/1.1\r\nX-Trace: one\r\nAccept: */*\r\nX-Trace: two\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    let traces: Vec<&str> = parsed.headers.get_all("x-trace").collect();
    assert_eq!(traces, vec!["one", "two"]);
    assert_eq!(parsed.headers.len(), 3);
}

#[test]
fn test_parse_header_lookup_is_case_insensitive() {
    let req = b"GET / HTTP/1.1\r\nContent-Type: application/json\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.headers.get("content-type"), Some("application/json"));
    assert_eq!(parsed.headers.iter().next(), Some(("Content-Type", "application/json")));
}

#[test]
fn test_parse_incomplete_request_missing_blank_line() {
    let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n";

    assert_eq!(parse_http_request(req).unwrap_err(), ParseError::Incomplete);
}

#[test]
fn test_parse_incomplete_request_partial_body() {
    let req = b"POST /api HTTP/1.1\r\nContent-Length: 10\r\n\r\nhello";

    assert_eq!(parse_http_request(req).unwrap_err(), ParseError::Incomplete);
}

#[test]
fn test_parse_extension_method_is_accepted() {
    let req = b"PROPFIND /dav HTTP/1.1\r\n\r\n";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.method, Method::Extension("PROPFIND".to_string()));
    assert_eq!(parsed.method.as_str(), "PROPFIND");
}

#[test]
fn test_parse_invalid_http_method() {
    let req = b"GE(T / HTTP/1.1\r\n\r\n";

    assert_eq!(parse_http_request(req).unwrap_err(), ParseError::InvalidMethod);
}

#[test]
fn test_parse_invalid_request_line() {
    assert_eq!(
        parse_http_request(b"GET /\r\n\r\n").unwrap_err(),
        ParseError::InvalidRequest
    );
    assert_eq!(
        parse_http_request(b"GET / FTP/1.0\r\n\r\n").unwrap_err(),
        ParseError::InvalidRequest
    );
}

#[test]
fn test_parse_malformed_header() {
    let req = b"GET / HTTP/1.1\r\nBrokenHeader\r\n\r\n";

    assert_eq!(parse_http_request(req).unwrap_err(), ParseError::InvalidHeader);
}

#[test]
fn test_parse_invalid_content_length() {
    let req = b"POST / HTTP/1.1\r\nContent-Length: lots\r\n\r\n";

    assert_eq!(parse_http_request(req).unwrap_err(), ParseError::InvalidContentLength);
}

#[test]
fn test_parse_conflicting_content_lengths() {
    let req = b"POST / HTTP/1.1\r\nContent-Length: 1\r\nContent-Length: 2\r\n\r\nab";

    assert_eq!(parse_http_request(req).unwrap_err(), ParseError::InvalidContentLength);
}

#[test]
fn test_parse_various_http_methods() {
    let methods = vec![
        ("GET", Method::GET),
        ("POST", Method::POST),
        ("PUT", Method::PUT),
        ("DELETE", Method::DELETE),
        ("HEAD", Method::HEAD),
        ("OPTIONS", Method::OPTIONS),
        ("PATCH", Method::PATCH),
    ];

    for (method_str, expected_method) in methods {
        let req = format!("{} / HTTP/1.1\r\n\r\n", method_str);
        let (parsed, _) = parse_http_request(req.as_bytes()).unwrap();
        assert_eq!(parsed.method, expected_method);
    }
}

#[test]
fn test_parse_request_with_binary_body() {
    let req = b"POST /upload HTTP/1.1\r\nContent-Length: 4\r\n\r\n\x00\x01\x02\x03";
    let (parsed, _) = parse_http_request(req).unwrap();

    assert_eq!(parsed.body, vec![0, 1, 2, 3]);
}

#[test]
fn test_parse_chunked_body() {
    let req = b"POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5;ext=1\r\npedia\r\n0\r\n\r\n";
    let (parsed, consumed) = parse_http_request(req).unwrap();

    assert_eq!(parsed.body, b"Wikipedia".to_vec());
    assert_eq!(consumed, req.len());
}

#[test]
fn test_parse_chunked_body_incomplete() {
    let req = b"POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWi";

    assert_eq!(parse_http_request(req).unwrap_err(), ParseError::Incomplete);
}

#[test]
fn test_decode_chunked_with_trailers() {
    let body = b"3\r\nabc\r\n0\r\nX-Checksum: 1\r\n\r\nGET";
    let (decoded, consumed) = decode_chunked(body, usize::MAX).unwrap();

    assert_eq!(decoded, b"abc".to_vec());
    assert_eq!(&body[consumed..], b"GET");
}

#[test]
fn test_decode_chunked_rejects_bad_size() {
    assert_eq!(
        decode_chunked(b"zz\r\nabc\r\n0\r\n\r\n", usize::MAX).unwrap_err(),
        ParseError::InvalidChunk
    );
}

#[test]
fn test_parse_body_over_limit() {
    let limits = ParseLimits {
        max_body_bytes: 4,
        ..ParseLimits::default()
    };
    let req = b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\n";

    assert_eq!(
        parse_http_request_with_limits(req, limits).unwrap_err(),
        ParseError::BodyTooLarge
    );
}

#[test]
fn test_parse_chunked_body_over_limit() {
    let limits = ParseLimits {
        max_body_bytes: 4,
        ..ParseLimits::default()
    };
    let req = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n";

    assert_eq!(
        parse_http_request_with_limits(req, limits).unwrap_err(),
        ParseError::BodyTooLarge
    );
}

#[test]
fn test_parse_headers_too_large() {
    let mut req = b"GET / HTTP/1.1\r\nX-Filler: ".to_vec();
    req.extend(std::iter::repeat_n(b'a', MAX_HEADER_BYTES + 1));

    assert_eq!(parse_http_request(&req).unwrap_err(), ParseError::HeadersTooLarge);
}
