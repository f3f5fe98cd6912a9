//! REST transport seam and the uniform response envelope.
//!
//! The crate never speaks HTTP itself. A collaborator supplies a [`Transport`] (or any
//! `tower::Service<HttpRequest>`, adapted with [`ServiceTransport`]) that turns a method,
//! path and JSON body into a status, headers and raw body.

use crate::error::{RestError, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::ServiceExt;
use tower_service::Service;

/// Outbound call.
///
/// `path` is relative to the API base (e.g. `/channels/1/messages`) and is what rate limiting
/// keys on; `url` is the absolute target the transport should hit.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<JsonValue>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        Self { method, url: path.clone(), path, headers: HeaderMap::new(), body: None }
    }

    /// Resolve `url` against an API root.
    pub fn with_base(mut self, base: &str) -> Self {
        self.url = format!("{}{}", base.trim_end_matches('/'), self.path);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }
}

/// Raw response as produced by the transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self { status, headers: HeaderMap::new(), body: Bytes::new() }
    }

    /// JSON body helper.
    pub fn json(status: StatusCode, body: &JsonValue) -> Self {
        Self { status, headers: HeaderMap::new(), body: Bytes::from(body.to_string()) }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// The transport call primitive.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Adapts a cloneable Tower service into a [`Transport`].
#[derive(Clone, Debug)]
pub struct ServiceTransport<S> {
    inner: S,
}

impl<S> ServiceTransport<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S> Transport for ServiceTransport<S>
where
    S: Service<HttpRequest, Response = HttpResponse, Error = TransportError>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.inner.clone().oneshot(request).await
    }
}

/// Tower view of a shared [`Transport`], so middleware can wrap a trait object.
#[derive(Clone)]
pub struct DynTransport(Arc<dyn Transport>);

impl DynTransport {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self(transport)
    }
}

impl fmt::Debug for DynTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DynTransport")
    }
}

impl Service<HttpRequest> for DynTransport {
    type Response = HttpResponse;
    type Error = TransportError;
    type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: HttpRequest) -> Self::Future {
        let transport = self.0.clone();
        Box::pin(async move { transport.call(req).await })
    }
}

/// Uniform result of a REST call.
///
/// Ordinary failures (bad auth, not found, remote validation errors, transport faults) never
/// panic or short-circuit; inspect [`ok`](Response::ok). `http` is kept whenever a response was
/// received, including on failure.
#[derive(Debug)]
pub struct Response<T> {
    pub value: Option<T>,
    pub http: Option<HttpResponse>,
    pub error: Option<RestError>,
}

impl<T> Response<T> {
    /// True when a value was obtained: a success response, or a cache hit (no `http`).
    pub fn ok(&self) -> bool {
        self.error.is_none()
            && self.value.is_some()
            && self.http.as_ref().map_or(true, HttpResponse::is_success)
    }

    /// Whether the value was served from the cache without a request.
    pub fn is_cached(&self) -> bool {
        self.http.is_none() && self.error.is_none()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.http.as_ref().map(|r| r.status)
    }

    /// Convert into a plain `Result`, dropping the raw response.
    pub fn into_result(self) -> Result<T, RestError> {
        match (self.value, self.error) {
            (_, Some(err)) => Err(err),
            (Some(value), None) => Ok(value),
            (None, None) => Err(RestError::Status {
                status: self.http.map_or(StatusCode::INTERNAL_SERVER_ERROR, |r| r.status),
            }),
        }
    }

    pub(crate) fn cached(value: T) -> Self {
        Self { value: Some(value), http: None, error: None }
    }

    pub(crate) fn faulted(error: TransportError) -> Self {
        Self { value: None, http: None, error: Some(RestError::Transport(error)) }
    }

    pub(crate) fn failed(http: HttpResponse) -> Self {
        let status = http.status;
        Self { value: None, http: Some(http), error: Some(RestError::Status { status }) }
    }
}

impl<T: DeserializeOwned> Response<T> {
    /// Decode a success response. Empty bodies (`204 No Content`) decode from JSON `null`.
    /// Types that decode from `null` (unit, `Option`) also accept a body they cannot read,
    /// so a `200 {}` still counts as success for endpoints that return nothing useful.
    pub(crate) fn decode(http: HttpResponse) -> Self {
        let parsed = if http.body.is_empty() {
            serde_json::from_value(JsonValue::Null)
        } else {
            serde_json::from_slice(&http.body)
                .or_else(|err| serde_json::from_value(JsonValue::Null).map_err(|_| err))
        };
        match parsed {
            Ok(value) => Self { value: Some(value), http: Some(http), error: None },
            Err(err) => Self { value: None, http: Some(http), error: Some(RestError::Decode(err)) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_success_body() {
        let http = HttpResponse::json(StatusCode::OK, &json!({"a": 1}));
        let resp: Response<JsonValue> = Response::decode(http);
        assert!(resp.ok());
        assert_eq!(resp.value, Some(json!({"a": 1})));
    }

    #[test]
    fn empty_body_decodes_unit() {
        let resp: Response<()> = Response::decode(HttpResponse::new(StatusCode::NO_CONTENT));
        assert!(resp.ok());
        assert_eq!(resp.value, Some(()));
    }

    #[test]
    fn unit_ignores_a_non_empty_body() {
        let resp: Response<()> = Response::decode(HttpResponse::json(StatusCode::OK, &json!({})));
        assert!(resp.ok());
        assert_eq!(resp.value, Some(()));
        assert!(resp.error.is_none());
    }

    #[test]
    fn decode_failure_keeps_raw_response() {
        let http = HttpResponse::json(StatusCode::OK, &json!("not a number"));
        let resp: Response<u64> = Response::decode(http);
        assert!(!resp.ok());
        assert!(resp.http.is_some());
        assert!(matches!(resp.error, Some(RestError::Decode(_))));
    }

    #[test]
    fn request_url_and_headers() {
        let req = HttpRequest::new(Method::GET, "/users/1")
            .with_base("https://example.test/api/")
            .with_header(http::header::AUTHORIZATION, HeaderValue::from_static("Bot t"));
        assert_eq!(req.url, "https://example.test/api/users/1");
        assert_eq!(req.path, "/users/1");
        assert_eq!(req.headers[http::header::AUTHORIZATION], "Bot t");
    }

    #[test]
    fn cached_envelope_is_ok() {
        let resp = Response::cached(5u8);
        assert!(resp.ok());
        assert!(resp.is_cached());
    }

    #[test]
    fn failed_and_faulted_envelopes() {
        let resp: Response<()> = Response::failed(HttpResponse::new(StatusCode::FORBIDDEN));
        assert!(!resp.ok());
        assert_eq!(resp.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(resp.into_result().unwrap_err().status(), Some(StatusCode::FORBIDDEN));

        let resp: Response<()> = Response::faulted(TransportError::Timeout);
        assert!(!resp.ok());
        assert!(resp.http.is_none());
        assert!(resp.into_result().unwrap_err().is_transport());
    }
}
