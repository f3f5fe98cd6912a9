//! Rate-limit metadata carried by REST responses.

use http::HeaderMap;
use std::time::Duration;

pub const REMAINING: &str = "x-ratelimit-remaining";
pub const LIMIT: &str = "x-ratelimit-limit";
pub const RESET: &str = "x-ratelimit-reset";
pub const RESET_AFTER: &str = "x-ratelimit-reset-after";
pub const GLOBAL: &str = "x-ratelimit-global";
pub const RETRY_AFTER: &str = "retry-after";

/// Whatever rate-limit fields a response declared. Every field is optional because some
/// routes return no metadata at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub remaining: Option<u32>,
    pub limit: Option<u32>,
    /// Absolute reset instant, epoch millis.
    pub reset_millis: Option<u64>,
    /// The 429 applied to the whole application, not just this route.
    pub global: bool,
    pub retry_after: Option<Duration>,
}

impl RateLimitHeaders {
    /// Read the rate-limit headers. `now_millis` resolves a relative `reset-after` when the
    /// absolute reset is missing. Unparseable values count as absent.
    pub fn from_headers(headers: &HeaderMap, now_millis: u64) -> Self {
        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);

        let remaining = text(REMAINING).and_then(|v| v.parse().ok());
        let limit = text(LIMIT).and_then(|v| v.parse().ok());
        let reset_millis = text(RESET).and_then(seconds_to_millis).or_else(|| {
            text(RESET_AFTER).and_then(seconds_to_millis).map(|after| now_millis.saturating_add(after))
        });
        let global = text(GLOBAL).map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false);
        let retry_after = text(RETRY_AFTER).and_then(seconds_to_millis).map(Duration::from_millis);

        Self { remaining, limit, reset_millis, global, retry_after }
    }

    /// True if nothing rate-limit related was present.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Seconds (fractional allowed) to whole millis; rejects negatives and non-finite values.
fn seconds_to_millis(raw: &str) -> Option<u64> {
    let secs: f64 = raw.parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * 1000.0).round() as u64)
}
