//! Process-wide pipeline stages: panic recovery, access logging and security headers.
//! The per-route stages live next to the state they manage (`session`, `csrf`, `auth`).

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderName, HeaderValue, Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::{any::Any, backtrace::Backtrace, net::SocketAddr};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::Span;

/// Headers set on every response, before any body is written.
pub const SECURITY_HEADERS: [(&str, &str); 5] = [
    (
        "content-security-policy",
        "default-src 'self'; style-src 'self' fonts.googleapis.com; font-src fonts.gstatic.com",
    ),
    ("referrer-policy", "origin-when-cross-origin"),
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "deny"),
    ("x-xss-protection", "0"),
];

/// One overriding header layer per entry of `SECURITY_HEADERS`.
pub fn security_header_layers() -> Vec<SetResponseHeaderLayer<HeaderValue>> {
    SECURITY_HEADERS
        .into_iter()
        .map(|(name, value)| {
            SetResponseHeaderLayer::overriding(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            )
        })
        .collect()
}

/// recover_panic
///
/// Handler for `CatchPanicLayer`. Records the panic payload with a backtrace, asks the
/// transport to close the connection, and answers with a bare 500. The security headers
/// are set here too, since the panic unwound past the layers that normally add them.
pub fn recover_panic(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    let backtrace = Backtrace::force_capture();
    tracing::error!(panic = %detail, %backtrace, "recovered from panic while handling request");

    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI, protocol version, remote address and the
/// request id, so every log line of a request can be correlated.
pub fn trace_span_logger(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        version = ?request.version(),
        remote_addr = %remote_addr,
        req_id = %request_id,
    )
}
