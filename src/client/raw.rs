//! wire-format renderings of requests and responses, used for raw capture and debugging
use super::utils::RequestTarget;
use crate::requests::Request;
use crate::std_ext::str::canonical_header_key;

use http::{HeaderMap, StatusCode, Version};

/// render `request` the way it is written to the connection
///
/// the `Host` line always comes first, taken from [`Request::host`]; a
/// `Content-Length` line is added whenever there's a body
pub(super) fn dump_request(request: &Request, target: &RequestTarget) -> String {
    let mut dump = format!("{} {} HTTP/1.1\r\n", request.method(), target.path());

    dump.push_str(&format!("Host: {}\r\n", request.host()));

    for (name, value) in request.headers() {
        if name.eq_ignore_ascii_case("host") {
            continue;
        }

        dump.push_str(&format!("{}: {value}\r\n", canonical_header_key(name)));
    }

    if !request.data().is_empty() {
        dump.push_str(&format!("Content-Length: {}\r\n", request.data().len()));
    }

    dump.push_str("\r\n");
    dump.push_str(&String::from_utf8_lossy(request.data()));

    dump
}

/// render a response's status line, headers, and (when it was downloaded) body
pub(super) fn dump_response(
    version: Version,
    status: StatusCode,
    headers: &HeaderMap,
    body: Option<&[u8]>,
) -> String {
    let mut dump = format!("{version:?} {status}\r\n");

    for (name, value) in headers {
        dump.push_str(&format!(
            "{}: {}\r\n",
            canonical_header_key(name.as_str()),
            String::from_utf8_lossy(value.as_bytes())
        ));
    }

    dump.push_str("\r\n");

    if let Some(body) = body {
        dump.push_str(&String::from_utf8_lossy(body));
    }

    dump
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn request_dump_has_host_first_and_a_content_length() {
        let url = "http://localhost:8080/login?next=%2F";
        let target = RequestTarget::parse(url, false).unwrap();

        let mut request = Request::new("POST", url);
        request.add_header("x-token", "abc");
        request.add_header("Host", "ignored-here");
        request.set_data(b"user=admin".to_vec());
        request.host = String::from("localhost:8080");

        assert_eq!(
            dump_request(&request, &target),
            "POST /login?next=%2F HTTP/1.1\r\n\
             Host: localhost:8080\r\n\
             X-Token: abc\r\n\
             Content-Length: 10\r\n\
             \r\n\
             user=admin"
        );
    }

    #[test]
    fn request_dump_without_body_ends_after_headers() {
        let target = RequestTarget::parse("https://example.com", false).unwrap();

        let mut request = Request::new("GET", "https://example.com");
        request.host = String::from("example.com");

        assert_eq!(
            dump_request(&request, &target),
            "GET / HTTP/1.1\r\nHost: example.com\r\n\r\n"
        );
    }

    #[test]
    fn request_dump_shows_the_literal_target() {
        let url = "http://localhost/static/../../etc/passwd";
        let target = RequestTarget::parse(url, true).unwrap();

        let mut request = Request::new("GET", url);
        request.host = String::from("localhost");

        assert!(dump_request(&request, &target)
            .starts_with("GET /static/../../etc/passwd HTTP/1.1\r\n"));
    }

    #[test]
    fn response_dump_includes_status_line_headers_and_body() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));

        let dump = dump_response(
            Version::HTTP_11,
            StatusCode::NOT_FOUND,
            &headers,
            Some(b"missing"),
        );

        assert_eq!(
            dump,
            "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\n\r\nmissing"
        );
    }

    #[test]
    fn response_dump_of_a_cancelled_body_stops_at_headers() {
        let dump = dump_response(Version::HTTP_2, StatusCode::OK, &HeaderMap::new(), None);

        assert_eq!(dump, "HTTP/2.0 200 OK\r\n\r\n");
    }
}
