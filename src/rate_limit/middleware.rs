//! Tower middleware running every request through its route bucket.

use crate::clock::duration_millis;
use crate::error::TransportError;
use crate::rate_limit::{Limiter, RateLimitHeaders};
use crate::rest::{HttpRequest, HttpResponse};
use http::StatusCode;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::ServiceExt;
use tower_layer::Layer;
use tower_service::Service;
use tracing::warn;

/// Pause applied to a 429 that declared neither `Retry-After` nor a reset.
const FALLBACK_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Default cap on consecutive 429 retries for one request.
pub const DEFAULT_MAX_RATE_LIMIT_RETRIES: usize = 5;

/// A layer that runs every request through its route's [`Bucket`](crate::rate_limit::Bucket).
#[derive(Clone, Debug)]
pub struct RateLimitLayer {
    limiter: Limiter,
    max_retries: usize,
}

impl RateLimitLayer {
    /// Create a new rate limit layer.
    pub fn new(limiter: Limiter) -> Self {
        Self { limiter, max_retries: DEFAULT_MAX_RATE_LIMIT_RETRIES }
    }

    /// How many times a request rejected with 429 is re-issued before the 429 is returned.
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimitService {
            inner: service,
            limiter: self.limiter.clone(),
            max_retries: self.max_retries,
        }
    }
}

/// Middleware service that serializes requests per route and waits out exhausted buckets.
#[derive(Clone, Debug)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Limiter,
    max_retries: usize,
}

impl<S> Service<HttpRequest> for RateLimitService<S>
where
    S: Service<HttpRequest, Response = HttpResponse, Error = TransportError>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = HttpResponse;
    type Error = TransportError;
    type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: HttpRequest) -> Self::Future {
        let limiter = self.limiter.clone();
        let inner = self.inner.clone();
        let max_retries = self.max_retries;

        Box::pin(limited_call(limiter, inner, req, max_retries))
    }
}

/// acquire → wait if limited → call → update from headers → retry on 429 → release.
async fn limited_call<S>(
    limiter: Limiter,
    mut inner: S,
    req: HttpRequest,
    max_retries: usize,
) -> Result<HttpResponse, TransportError>
where
    S: Service<HttpRequest, Response = HttpResponse, Error = TransportError> + Send,
    S::Future: Send,
{
    let bucket = limiter.bucket(&req.method, &req.path);
    let _permit = bucket.acquire().await;
    let mut retries = 0;

    loop {
        limiter.wait_global().await;
        if bucket.is_limited() {
            limiter.wait(&bucket).await;
        }

        let response = inner.ready().await?.call(req.clone()).await?;
        let now = limiter.now_millis();
        let headers = RateLimitHeaders::from_headers(&response.headers, now);
        bucket.update(&headers);

        if response.status != StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }
        if retries >= max_retries {
            warn!(target: "gatewire::limiter", route = %bucket.key(), retries, "rate limited; giving up");
            return Ok(response);
        }
        retries += 1;

        let until = headers
            .retry_after
            .map(|after| now.saturating_add(duration_millis(after)))
            .or(headers.reset_millis)
            .unwrap_or_else(|| now.saturating_add(duration_millis(FALLBACK_RETRY_AFTER)));
        if headers.global {
            limiter.set_global_reset(until);
        } else {
            bucket.exhaust_until(until);
        }
        warn!(
            target: "gatewire::limiter",
            route = %bucket.key(),
            global = headers.global,
            wait_ms = until.saturating_sub(now),
            retry = retries,
            "rate limited; retrying after reset"
        );
    }
}
