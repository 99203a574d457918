//! Probe request construction.
//!
//! # Responsibilities
//! - Dump the original request (line, headers, body) in HTTP/1.x wire form
//! - Wrap the dump in a POST to the detection endpoint
//! - Add `Host`, `Content-Length` and the correlation header
//!
//! # Design Decisions
//! - `Transfer-Encoding` and `Trailer` are dropped from the dump; the body
//!   is already fully buffered
//! - A dump of a request with a body but no `Content-Length` gets one, so
//!   the backend can frame the embedded body
//! - `Content-Length` of the probe is always set explicitly

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, HOST, TRAILER, TRANSFER_ENCODING};
use axum::http::{Method, Request, Uri};
use bytes::{BufMut, Bytes, BytesMut};

use crate::error::WafError;

/// Host of the original request: the raw `Host` header, else the URI authority.
pub fn request_host<B>(request: &Request<B>) -> Option<HeaderValue> {
    if let Some(host) = request.headers().get(HOST) {
        if !host.is_empty() {
            return Some(host.clone());
        }
    }
    request
        .uri()
        .authority()
        .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
}

/// Serialize the full original request into its HTTP/1.x wire form.
pub fn dump_request(request: &Request<Bytes>) -> Bytes {
    let body = request.body();
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|pq| !pq.is_empty())
        .unwrap_or("/");

    let mut buf = BytesMut::with_capacity(256 + body.len());
    buf.put_slice(request.method().as_str().as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(target.as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(format!("{:?}", request.version()).as_bytes());
    buf.put_slice(b"\r\n");

    if let Some(host) = request_host(request) {
        put_header(&mut buf, HOST.as_str(), host.as_bytes());
    }

    for (name, value) in request.headers() {
        if name == HOST || name == TRANSFER_ENCODING || name == TRAILER {
            continue;
        }
        put_header(&mut buf, name.as_str(), value.as_bytes());
    }

    if !body.is_empty() && !request.headers().contains_key(CONTENT_LENGTH) {
        put_header(&mut buf, CONTENT_LENGTH.as_str(), body.len().to_string().as_bytes());
    }

    buf.put_slice(b"\r\n");
    buf.put_slice(body);
    buf.freeze()
}

fn put_header(buf: &mut BytesMut, name: &str, value: &[u8]) {
    buf.put_slice(name.as_bytes());
    buf.put_slice(b": ");
    buf.put_slice(value);
    buf.put_slice(b"\r\n");
}

/// Build the probe forwarded to the detection endpoint.
pub fn build_probe(
    request: &Request<Bytes>,
    detect_uri: &Uri,
    correlation_header: &HeaderName,
    correlation_id: &str,
) -> Result<Request<Body>, WafError> {
    let dump = dump_request(request);

    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(detect_uri.clone());

    if let Some(host) = request_host(request) {
        builder = builder.header(HOST, host);
    }

    let correlation = HeaderValue::from_str(correlation_id)
        .map_err(|e| WafError::InvalidRequest(format!("correlation id: {}", e)))?;

    builder
        .header(CONTENT_LENGTH, dump.len())
        .header(correlation_header.clone(), correlation)
        .body(Body::from(dump))
        .map_err(|e| WafError::InvalidRequest(e.to_string()))
}
