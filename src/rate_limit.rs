//! Per-route rate limiting.
//!
//! This module provides the building blocks that keep outbound REST traffic inside the
//! remote service's token-bucket policy:
//! - [`parse_endpoint`]: maps `(path, method)` to the canonical bucket key.
//! - [`Bucket`]: per-route single-flight gate plus remaining/reset bookkeeping.
//! - [`Limiter`]: registry of buckets keyed by route, created on demand.
//! - [`RateLimitLayer`]: Tower middleware that runs every request through its bucket.
//!
//! # Architecture
//!
//! - **Middleware**: `RateLimitLayer` wraps a transport service. It acquires the bucket,
//!   waits out exhausted windows, forwards the call, feeds the response headers back into the
//!   bucket and re-issues requests rejected with `429 Too Many Requests`.
//! - **State**: `Bucket` only learns its limits from responses; a bucket that has never seen
//!   a response is never limited.

pub mod bucket;
pub mod headers;
pub mod limiter;
pub mod middleware;
pub mod route;

pub use bucket::{Bucket, BucketPermit};
pub use headers::RateLimitHeaders;
pub use limiter::Limiter;
pub use middleware::{RateLimitLayer, RateLimitService};
pub use route::parse_endpoint;
