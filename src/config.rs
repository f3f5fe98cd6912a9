//! Client configuration and live-updatable settings.
//!
//! [`DynamicConfig`] gives lock-free reads (`ArcSwap`) and whole-value replacement, so the
//! cache toggle and the cache TTLs can be changed while the client is running.

use crate::clock::{Clock, SystemClock};
use crate::error::ConfigError;
use crate::rate_limit::middleware::DEFAULT_MAX_RATE_LIMIT_RETRIES;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::state::EntityKind;
use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default REST API root.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Default number of entries kept by the error log.
pub const DEFAULT_ERROR_LOG_CAPACITY: usize = 1000;

/// Cheap reads and controlled updates for shared config. Clones share the value.
#[derive(Debug)]
pub struct DynamicConfig<T> {
    inner: Arc<ArcSwap<T>>,
}

impl<T> Clone for DynamicConfig<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> DynamicConfig<T> {
    pub fn new(value: T) -> Self {
        Self { inner: Arc::new(ArcSwap::from_pointee(value)) }
    }

    /// Snapshot the current value.
    pub fn get(&self) -> Arc<T> {
        self.inner.load_full()
    }

    pub fn set(&self, value: T) {
        self.inner.store(Arc::new(value));
    }

    /// Replace the value with one derived from the current one, returning the previous value.
    ///
    /// Concurrent updaters never lose each other's writes.
    pub fn update<F>(&self, f: F) -> Arc<T>
    where
        F: Fn(&T) -> T,
    {
        self.inner.rcu(|cur| f(cur))
    }
}

/// How long cached entries of each kind stay visible. `None` keeps them until evicted
/// by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub users: Option<Duration>,
    pub guilds: Option<Duration>,
    pub channels: Option<Duration>,
    pub members: Option<Duration>,
    pub roles: Option<Duration>,
    pub messages: Option<Duration>,
    pub presences: Option<Duration>,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            users: None,
            guilds: None,
            channels: None,
            members: None,
            roles: None,
            messages: Some(Duration::from_secs(60 * 60)),
            presences: Some(Duration::from_secs(10 * 60)),
        }
    }
}

impl CacheTtls {
    /// No entry ever expires.
    pub fn unbounded() -> Self {
        Self {
            users: None,
            guilds: None,
            channels: None,
            members: None,
            roles: None,
            messages: None,
            presences: None,
        }
    }

    pub fn for_kind(&self, kind: EntityKind) -> Option<Duration> {
        match kind {
            EntityKind::User => self.users,
            EntityKind::Guild => self.guilds,
            EntityKind::Channel => self.channels,
            EntityKind::Member => self.members,
            EntityKind::Role => self.roles,
            EntityKind::Message => self.messages,
            EntityKind::Presence => self.presences,
        }
    }

    pub fn with_kind(mut self, kind: EntityKind, ttl: Option<Duration>) -> Self {
        let slot = match kind {
            EntityKind::User => &mut self.users,
            EntityKind::Guild => &mut self.guilds,
            EntityKind::Channel => &mut self.channels,
            EntityKind::Member => &mut self.members,
            EntityKind::Role => &mut self.roles,
            EntityKind::Message => &mut self.messages,
            EntityKind::Presence => &mut self.presences,
        };
        *slot = ttl;
        self
    }
}

/// Shared cache enable flag.
///
/// Advisory only: handlers dispatched concurrently with a [`scoped`](CacheToggle::scoped)
/// override may observe either value around the scope's boundaries.
#[derive(Clone, Debug)]
pub struct CacheToggle {
    enabled: DynamicConfig<bool>,
}

impl CacheToggle {
    pub fn new(enabled: bool) -> Self {
        Self { enabled: DynamicConfig::new(enabled) }
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.get()
    }

    pub fn set(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    /// Override the flag until the returned guard is dropped, then restore the previous value.
    pub fn scoped(&self, enabled: bool) -> CacheGuard {
        let previous = *self.enabled.update(|_| enabled);
        CacheGuard { toggle: self.clone(), previous }
    }
}

/// Restores the cache flag on drop, including on unwind and cancellation.
#[must_use = "the override ends when the guard is dropped"]
#[derive(Debug)]
pub struct CacheGuard {
    toggle: CacheToggle,
    previous: bool,
}

impl Drop for CacheGuard {
    fn drop(&mut self) {
        self.toggle.set(self.previous);
    }
}

/// Validated client configuration. Build with [`ClientConfig::builder`].
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) token: String,
    pub(crate) api_base: String,
    pub(crate) cache_enabled: bool,
    pub(crate) ttls: CacheTtls,
    pub(crate) max_rate_limit_retries: usize,
    pub(crate) error_log_capacity: usize,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) sleeper: Arc<dyn Sleeper>,
}

impl ClientConfig {
    pub fn builder(token: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(token)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    pub fn ttls(&self) -> CacheTtls {
        self.ttls
    }

    pub fn max_rate_limit_retries(&self) -> usize {
        self.max_rate_limit_retries
    }

    pub fn error_log_capacity(&self) -> usize {
        self.error_log_capacity
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn sleeper(&self) -> Arc<dyn Sleeper> {
        self.sleeper.clone()
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("cache_enabled", &self.cache_enabled)
            .field("ttls", &self.ttls)
            .field("max_rate_limit_retries", &self.max_rate_limit_retries)
            .field("error_log_capacity", &self.error_log_capacity)
            .field("clock", &self.clock)
            .field("sleeper", &self.sleeper)
            .finish()
    }
}

/// Builder for [`ClientConfig`].
pub struct ClientConfigBuilder {
    token: String,
    api_base: String,
    cache_enabled: bool,
    ttls: CacheTtls,
    max_rate_limit_retries: usize,
    error_log_capacity: usize,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
}

impl ClientConfigBuilder {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            cache_enabled: true,
            ttls: CacheTtls::default(),
            max_rate_limit_retries: DEFAULT_MAX_RATE_LIMIT_RETRIES,
            error_log_capacity: DEFAULT_ERROR_LOG_CAPACITY,
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// REST API root; a trailing slash is dropped.
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }

    /// Cap on re-issuing a request rejected with 429. Zero returns the first 429.
    pub fn max_rate_limit_retries(mut self, retries: usize) -> Self {
        self.max_rate_limit_retries = retries;
        self
    }

    pub fn error_log_capacity(mut self, capacity: usize) -> Self {
        self.error_log_capacity = capacity;
        self
    }

    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::EmptyToken);
        }
        let api_base = self.api_base.trim_end_matches('/').to_string();
        if !(api_base.starts_with("https://") || api_base.starts_with("http://")) {
            return Err(ConfigError::InvalidApiBase(self.api_base));
        }
        if self.error_log_capacity == 0 {
            return Err(ConfigError::ZeroErrorLogCapacity);
        }
        Ok(ClientConfig {
            token: self.token,
            api_base,
            cache_enabled: self.cache_enabled,
            ttls: self.ttls,
            max_rate_limit_retries: self.max_rate_limit_retries,
            error_log_capacity: self.error_log_capacity,
            clock: self.clock,
            sleeper: self.sleeper,
        })
    }
}
