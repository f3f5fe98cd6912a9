//! The per-application context object.
//!
//! A [`Client`] owns everything that used to be process-wide: the rate limiter, the handler
//! registry, the entity cache, the cache toggle and the error log. It is cheap to clone and
//! every clone refers to the same state.

use crate::cache_gate::should_put;
use crate::config::{CacheToggle, ClientConfig, DynamicConfig};
use crate::entities::{Channel, Guild, Message, Snowflake, User};
use crate::error::RegistrationError;
use crate::error_log::{ErrorLog, ErrorSource, LoggedError};
use crate::events::{Event, EventSet, EventType};
use crate::handlers::{self, Callback, HandlerModule, HandlerOptions, HandlerRegistry, Tag};
use crate::rate_limit::{Limiter, RateLimitLayer, RateLimitService};
use crate::rest::{DynTransport, HttpRequest, Response, Transport};
use crate::state::State;
use futures::FutureExt;
use http::header::{HeaderValue, AUTHORIZATION};
use http::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value as JsonValue};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tower::ServiceExt;
use tower_layer::Layer;
use tracing::{debug, error, warn};

/// Values that know how to write themselves into [`State`] after a REST call.
pub trait Cacheable {
    fn cache(&self, _state: &State) {}
}

impl Cacheable for User {
    fn cache(&self, state: &State) {
        state.users.upsert(self.id, self.clone());
    }
}

impl Cacheable for Guild {
    fn cache(&self, state: &State) {
        state.put_guild(self.clone());
    }
}

impl Cacheable for Channel {
    fn cache(&self, state: &State) {
        state.put_channel(self.clone());
    }
}

impl Cacheable for Message {
    fn cache(&self, state: &State) {
        state.put_message(self.clone());
    }
}

impl<T: Cacheable> Cacheable for Vec<T> {
    fn cache(&self, state: &State) {
        for item in self {
            item.cache(state);
        }
    }
}

impl<T: Cacheable> Cacheable for Option<T> {
    fn cache(&self, state: &State) {
        if let Some(item) = self {
            item.cache(state);
        }
    }
}

impl Cacheable for () {}
impl Cacheable for JsonValue {}

struct Inner {
    config: ClientConfig,
    limiter: Limiter,
    registry: HandlerRegistry,
    state: State,
    cache: CacheToggle,
    errors: ErrorLog,
    http: RateLimitService<DynTransport>,
}

/// Handle to one application's runtime state.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("handlers", &self.inner.registry.len())
            .field("cache_enabled", &self.inner.cache.is_enabled())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Build a client over `transport`, with the default cache handlers installed.
    pub fn new<T>(config: ClientConfig, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let clock = config.clock();
        let limiter = Limiter::new(clock.clone(), config.sleeper());
        let http = RateLimitLayer::new(limiter.clone())
            .max_retries(config.max_rate_limit_retries())
            .layer(DynTransport::new(transport));
        let registry = HandlerRegistry::new(clock.clone());
        handlers::defaults::register(&registry);
        let state = State::new(DynamicConfig::new(config.ttls()), clock);

        Self {
            inner: Arc::new(Inner {
                cache: CacheToggle::new(config.cache_enabled()),
                errors: ErrorLog::with_capacity(config.error_log_capacity()),
                limiter,
                registry,
                state,
                http,
                config,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn limiter(&self) -> &Limiter {
        &self.inner.limiter
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }

    pub fn state(&self) -> &State {
        &self.inner.state
    }

    /// Errors swallowed by dispatch and REST calls.
    pub fn errors(&self) -> &ErrorLog {
        &self.inner.errors
    }

    pub fn cache_enabled(&self) -> bool {
        self.inner.cache.is_enabled()
    }

    pub fn set_cache_enabled(&self, enabled: bool) {
        self.inner.cache.set(enabled);
    }

    /// Run `fut` with the cache toggled to `enabled`, restoring the previous value afterwards
    /// (also on panic or cancellation).
    ///
    /// The toggle is shared and advisory: handlers running concurrently on other tasks may
    /// observe the override, and writes racing the scope's boundaries may see either value.
    pub async fn with_cache<F>(&self, enabled: bool, fut: F) -> F::Output
    where
        F: Future,
    {
        let _guard = self.inner.cache.scoped(enabled);
        fut.await
    }

    fn now_millis(&self) -> u64 {
        self.inner.config.clock.now_millis()
    }

    fn record(&self, source: ErrorSource, context: String, message: String) {
        self.inner.errors.record(LoggedError { source, context, message, at_millis: self.now_millis() });
    }

    // Handlers

    /// Register `callback` for `events` under a fresh tag.
    pub fn add_handler(
        &self,
        events: impl Into<EventSet>,
        callback: Callback,
    ) -> Result<Tag, RegistrationError> {
        self.inner.registry.add(events, callback, HandlerOptions::default())
    }

    pub fn add_handler_with(
        &self,
        events: impl Into<EventSet>,
        callback: Callback,
        options: HandlerOptions,
    ) -> Result<Tag, RegistrationError> {
        self.inner.registry.add(events, callback, options)
    }

    pub fn add_module(
        &self,
        module: &HandlerModule,
        options: HandlerOptions,
    ) -> Result<Vec<Tag>, RegistrationError> {
        self.inner.registry.add_module(module, options)
    }

    pub fn delete_handlers(&self, event_type: EventType) -> usize {
        self.inner.registry.delete(event_type)
    }

    pub fn delete_handler(&self, event_type: EventType, tag: &Tag) -> bool {
        self.inner.registry.delete_tag(event_type, tag)
    }

    // Dispatch

    /// Run every applicable handler for `event`, in dispatch order.
    ///
    /// Each handler is awaited before the next starts. A handler that panics is logged and
    /// recorded in [`errors`](Client::errors); the rest still run.
    pub async fn dispatch(&self, event: Event) {
        let event_type = event.event_type();
        let handlers = self.inner.registry.allhandlers(event_type);
        debug!(target: "gatewire::handlers", event = %event_type, handlers = handlers.len(), "dispatching");

        for handler in handlers {
            if !handler.try_consume(self.now_millis()) {
                continue;
            }
            let fut = handler.callback().call(self.clone(), event.clone());
            if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
                let message = panic_message(panic.as_ref());
                error!(
                    target: "gatewire::handlers",
                    event = %event_type,
                    tag = %handler.tag(),
                    %message,
                    "handler panicked"
                );
                self.record(ErrorSource::Handler, format!("{event_type} {}", handler.tag()), message);
            }
        }
    }

    /// Decode a raw gateway dispatch and [`dispatch`](Client::dispatch) it. A payload that
    /// fails to parse is recorded and delivered as [`Event::Unknown`].
    pub async fn dispatch_raw(&self, t: &str, d: JsonValue, s: Option<u64>) {
        let (event, err) = Event::decode(t, d, s);
        if let Some(err) = err {
            warn!(target: "gatewire::client", event = t, error = %err, "gateway payload failed to parse");
            self.record(ErrorSource::Parse, t.to_string(), err.to_string());
        }
        self.dispatch(event).await;
    }

    // REST

    /// Perform a rate-limited REST call and decode its body as `T`.
    ///
    /// Never fails outright: inspect [`Response::ok`]. On success with the cache enabled, the
    /// value is cached unless a default handler will cache the same data from the gateway.
    pub async fn request<T>(&self, method: Method, path: &str, body: Option<JsonValue>) -> Response<T>
    where
        T: DeserializeOwned + Cacheable,
    {
        let mut req = HttpRequest::new(method.clone(), path).with_base(self.inner.config.api_base());
        if let Ok(auth) = HeaderValue::from_str(&format!("Bot {}", self.inner.config.token())) {
            req = req.with_header(AUTHORIZATION, auth);
        }
        if let Some(body) = body {
            req = req.with_body(body);
        }

        let http = match self.inner.http.clone().oneshot(req).await {
            Ok(http) => http,
            Err(err) => {
                warn!(target: "gatewire::client", %method, path, error = %err, "request faulted");
                self.record(ErrorSource::Rest, format!("{method} {path}"), err.to_string());
                return Response::faulted(err);
            }
        };
        if !http.is_success() {
            debug!(target: "gatewire::client", %method, path, status = %http.status, "request failed");
            return Response::failed(http);
        }

        let response = Response::<T>::decode(http);
        match (&response.value, &response.error) {
            (Some(value), _) => {
                if self.cache_enabled() && should_put(&method, path, &self.inner.registry) {
                    value.cache(&self.inner.state);
                }
            }
            (None, Some(err)) => {
                warn!(target: "gatewire::client", %method, path, error = %err, "response body did not decode");
                self.record(ErrorSource::Rest, format!("{method} {path}"), err.to_string());
            }
            (None, None) => {}
        }
        response
    }

    /// Cached user, or `GET /users/{id}`.
    pub async fn get_user(&self, id: Snowflake) -> Response<User> {
        if let Some(user) = self.cached(|s| s.users.get(&id)) {
            return Response::cached(user);
        }
        self.request(Method::GET, &format!("/users/{id}"), None).await
    }

    /// Cached channel, or `GET /channels/{id}`.
    pub async fn get_channel(&self, id: Snowflake) -> Response<Channel> {
        if let Some(channel) = self.cached(|s| s.channels.get(&id)) {
            return Response::cached(channel);
        }
        self.request(Method::GET, &format!("/channels/{id}"), None).await
    }

    /// Cached guild, or `GET /guilds/{id}`.
    pub async fn get_guild(&self, id: Snowflake) -> Response<Guild> {
        if let Some(guild) = self.cached(|s| s.guilds.get(&id)) {
            return Response::cached(guild);
        }
        self.request(Method::GET, &format!("/guilds/{id}"), None).await
    }

    /// Cached message, or `GET /channels/{channel_id}/messages/{id}`.
    pub async fn get_message(&self, channel_id: Snowflake, id: Snowflake) -> Response<Message> {
        let hit = self.cached(|s| s.messages.get(&id)).filter(|m| m.channel_id == channel_id);
        if let Some(message) = hit {
            return Response::cached(message);
        }
        self.request(Method::GET, &format!("/channels/{channel_id}/messages/{id}"), None).await
    }

    pub async fn create_message(&self, channel_id: Snowflake, content: &str) -> Response<Message> {
        let body = json!({ "content": content });
        self.request(Method::POST, &format!("/channels/{channel_id}/messages"), Some(body)).await
    }

    pub async fn edit_message(
        &self,
        channel_id: Snowflake,
        id: Snowflake,
        content: &str,
    ) -> Response<Message> {
        let body = json!({ "content": content });
        self.request(Method::PATCH, &format!("/channels/{channel_id}/messages/{id}"), Some(body)).await
    }

    /// Delete a message. The cached copy is dropped here unless the `MESSAGE_DELETE` default
    /// handler will do it.
    pub async fn delete_message(&self, channel_id: Snowflake, id: Snowflake) -> Response<()> {
        let path = format!("/channels/{channel_id}/messages/{id}");
        let response = self.request(Method::DELETE, &path, None).await;
        if response.ok() && self.cache_enabled() && should_put(&Method::DELETE, &path, &self.inner.registry) {
            self.inner.state.messages.remove(&id);
        }
        response
    }

    fn cached<V>(&self, lookup: impl FnOnce(&State) -> Option<V>) -> Option<V> {
        if self.cache_enabled() {
            lookup(&self.inner.state)
        } else {
            None
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
