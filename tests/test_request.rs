use proxilate::http::headers::Headers;
use proxilate::http::request::{Method, Request, RequestBuilder};

fn request_with(version: &str, headers: &[(&str, &str)]) -> Request {
    Request {
        method: Method::GET,
        path: "/".to_string(),
        version: version.to_string(),
        headers: headers.iter().copied().collect(),
        body: vec![],
    }
}

#[test]
fn test_request_header_lookup() {
    let req = request_with("HTTP/1.1", &[("Content-Type", "application/json")]);

    assert_eq!(req.header("content-type"), Some("application/json"));
    assert_eq!(req.header("Accept"), None);
}

#[test]
fn test_request_content_length() {
    let req = request_with("HTTP/1.1", &[("Content-Length", "42")]);

    assert_eq!(req.content_length(), 42);
}

#[test]
fn test_request_content_length_missing() {
    let req = request_with("HTTP/1.1", &[]);

    assert_eq!(req.content_length(), 0);
}

#[test]
fn test_request_content_length_invalid() {
    let req = request_with("HTTP/1.1", &[("Content-Length", "not-a-number")]);

    assert_eq!(req.content_length(), 0);
}

#[test]
fn test_request_keep_alive_http11_default() {
    assert!(request_with("HTTP/1.1", &[]).keep_alive());
}

#[test]
fn test_request_keep_alive_close() {
    assert!(!request_with("HTTP/1.1", &[("Connection", "close")]).keep_alive());
}

#[test]
fn test_request_keep_alive_token_list() {
    assert!(!request_with("HTTP/1.1", &[("Connection", "Upgrade, Close")]).keep_alive());
}

#[test]
fn test_request_keep_alive_http10() {
    assert!(!request_with("HTTP/1.0", &[]).keep_alive());
    assert!(request_with("HTTP/1.0", &[("Connection", "Keep-Alive")]).keep_alive());
}

#[test]
fn test_request_method_parse() {
    assert_eq!(Method::parse("GET"), Some(Method::GET));
    assert_eq!(Method::parse("POST"), Some(Method::POST));
    assert_eq!(Method::parse("get"), Some(Method::Extension("get".to_string()))); // Case-sensitive
    assert_eq!(Method::parse(""), None);
    assert_eq!(Method::parse("GE T"), None);
}

#[test]
fn test_request_method_display() {
    assert_eq!(Method::DELETE.to_string(), "DELETE");
    assert_eq!(Method::Extension("MKCOL".to_string()).to_string(), "MKCOL");
}

#[test]
fn test_request_builder() {
    let req = RequestBuilder::new()
        .method(Method::POST)
        .path("/http://example.com/")
        .header("X-Trace", "one")
        .header("X-Trace", "two")
        .body("payload")
        .build()
        .unwrap();

    assert_eq!(req.version, "HTTP/1.1");
    assert_eq!(req.headers.get_all("X-Trace").count(), 2);
    assert_eq!(req.body, b"payload".to_vec());
}

#[test]
fn test_request_builder_requires_method_and_path() {
    assert!(RequestBuilder::new().path("/").build().is_err());
    assert!(RequestBuilder::new().method(Method::GET).build().is_err());
}

#[test]
fn test_headers_insert_replaces_all_values() {
    let mut headers = Headers::new();
    headers.append("Via", "a");
    headers.append("via", "b");
    headers.insert("VIA", "c");

    assert_eq!(headers.get_all("Via").collect::<Vec<_>>(), vec!["c"]);
}

#[test]
fn test_headers_remove_counts_matches() {
    let mut headers: Headers = [("Cookie", "a=1"), ("cookie", "b=2"), ("Accept", "*/*")]
        .into_iter()
        .collect();

    assert_eq!(headers.remove("COOKIE"), 2);
    assert_eq!(headers.len(), 1);
    assert!(!headers.contains("Cookie"));
}
