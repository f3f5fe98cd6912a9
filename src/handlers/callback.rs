use crate::client::Client;
use crate::clock::duration_millis;
use crate::events::{Event, EventSet, EventType, GatewayEvent};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Future returned by a handler invocation.
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

type CallbackFn = dyn Fn(Client, Event) -> HandlerFuture + Send + Sync;

/// What a callback can receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accepts {
    /// Every event, including the catch-all and fallback slots.
    All,
    /// Only these concrete types.
    Only(EventSet),
}

impl fmt::Display for Accepts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accepts::All => f.write_str("any event"),
            Accepts::Only(set) => write!(f, "{set}"),
        }
    }
}

/// A boxed async event callback together with the event types it accepts.
#[derive(Clone)]
pub struct Callback {
    accepts: Accepts,
    f: Arc<CallbackFn>,
}

impl Callback {
    /// Callback receiving every event as an [`Event`]. The only kind accepted by the
    /// catch-all and fallback slots.
    pub fn any<F, Fut>(f: F) -> Self
    where
        F: Fn(Client, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            accepts: Accepts::All,
            f: Arc::new(move |c: Client, e: Event| -> HandlerFuture { Box::pin(f(c, e)) }),
        }
    }

    /// Callback typed on a single payload.
    pub fn on<T, F, Fut>(f: F) -> Self
    where
        T: GatewayEvent,
        F: Fn(Client, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            accepts: Accepts::Only(EventSet::from(T::TYPE)),
            f: Arc::new(move |client: Client, event: Event| -> HandlerFuture {
                match T::from_event(&event) {
                    Some(payload) => Box::pin(f(client, payload.clone())),
                    None => Box::pin(async {}),
                }
            }),
        }
    }

    /// Callback receiving the raw [`Event`] for any member of `set`.
    pub fn for_events<F, Fut>(set: impl Into<EventSet>, f: F) -> Self
    where
        F: Fn(Client, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            accepts: Accepts::Only(set.into()),
            f: Arc::new(move |c: Client, e: Event| -> HandlerFuture { Box::pin(f(c, e)) }),
        }
    }

    pub fn accepts(&self) -> &Accepts {
        &self.accepts
    }

    /// Whether this callback can be registered for `event_type`.
    pub fn can_handle(&self, event_type: EventType) -> bool {
        match &self.accepts {
            Accepts::All => true,
            Accepts::Only(set) => !event_type.is_marker() && set.contains(event_type),
        }
    }

    pub fn call(&self, client: Client, event: Event) -> HandlerFuture {
        (self.f)(client, event)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").field("accepts", &self.accepts).finish_non_exhaustive()
    }
}

/// When a handler stops running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    #[default]
    Never,
    /// After this many invocations. Zero or less is already expired.
    Count(i64),
    /// At this epoch-millisecond instant.
    Until(u64),
    /// This long after registration.
    After(Duration),
}

impl Expiry {
    pub fn after(duration: Duration) -> Self {
        Expiry::After(duration)
    }

    pub fn times(count: i64) -> Self {
        Expiry::Count(count)
    }
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expiry::Never => f.write_str("never"),
            Expiry::Count(n) => write!(f, "after {n} invocations"),
            Expiry::Until(at) => write!(f, "at {at}ms"),
            Expiry::After(d) => write!(f, "after {d:?}"),
        }
    }
}

/// Lifecycle of a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Active(Remaining),
    Expired,
}

/// What is left of an active handler's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Unbounded,
    Invocations(i64),
    Deadline(u64),
}

impl HandlerState {
    /// Resolve an expiry against the registration instant.
    pub(crate) fn from_expiry(expiry: Expiry, now: u64) -> Self {
        let state = match expiry {
            Expiry::Never => HandlerState::Active(Remaining::Unbounded),
            Expiry::Count(n) => HandlerState::Active(Remaining::Invocations(n)),
            Expiry::Until(at) => HandlerState::Active(Remaining::Deadline(at)),
            Expiry::After(d) => {
                HandlerState::Active(Remaining::Deadline(now.saturating_add(duration_millis(d))))
            }
        };
        state.settle(now)
    }

    /// Move to `Expired` if the count is used up or the deadline has passed.
    fn settle(self, now: u64) -> Self {
        match self {
            HandlerState::Active(Remaining::Invocations(n)) if n <= 0 => HandlerState::Expired,
            HandlerState::Active(Remaining::Deadline(at)) if now >= at => HandlerState::Expired,
            other => other,
        }
    }
}

/// Handler identifier. Registering twice under one tag for one type replaces the first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(Arc<str>);

const DEFAULT_TAG: &str = "gatewire:default";

impl Tag {
    pub fn new(name: impl AsRef<str>) -> Self {
        Tag(Arc::from(name.as_ref()))
    }

    /// A tag nobody else holds.
    pub fn fresh() -> Self {
        Tag::new(uuid::Uuid::new_v4().to_string())
    }

    /// Reserved tag of the built-in cache-maintaining handlers.
    pub fn default_handler() -> Self {
        Tag::new(DEFAULT_TAG)
    }

    pub fn is_default(&self) -> bool {
        &*self.0 == DEFAULT_TAG
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Tag::new(name)
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Tag(Arc::from(name))
    }
}

/// A registered callback with its tag and lifecycle.
#[derive(Debug)]
pub struct Handler {
    tag: Tag,
    callback: Callback,
    state: Mutex<HandlerState>,
}

impl Handler {
    pub(crate) fn new(tag: Tag, callback: Callback, state: HandlerState) -> Self {
        Self { tag, callback, state: Mutex::new(state) }
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn callback(&self) -> &Callback {
        &self.callback
    }

    /// Current state, expiring it first if its deadline has passed.
    pub fn state(&self, now: u64) -> HandlerState {
        let mut guard = self.state.lock().expect("handler state poisoned");
        *guard = guard.settle(now);
        *guard
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.state(now) == HandlerState::Expired
    }

    /// Claim one invocation. `false` if the handler has expired; the claim that uses up a
    /// count-limited handler still returns `true`.
    pub fn try_consume(&self, now: u64) -> bool {
        let mut guard = self.state.lock().expect("handler state poisoned");
        match guard.settle(now) {
            HandlerState::Expired => {
                *guard = HandlerState::Expired;
                false
            }
            HandlerState::Active(Remaining::Invocations(n)) => {
                *guard = HandlerState::Active(Remaining::Invocations(n - 1)).settle(now);
                true
            }
            active => {
                *guard = active;
                true
            }
        }
    }
}
