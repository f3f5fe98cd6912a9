use crate::clock::{Clock, SystemClock};
use crate::error::RegistrationError;
use crate::events::{EventSet, EventType};
use crate::handlers::{Callback, Expiry, Handler, HandlerModule, HandlerState, Tag};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Tag and expiry applied to a registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerOptions {
    /// `None` registers under a fresh tag, so repeated registrations accumulate.
    pub tag: Option<Tag>,
    pub expiry: Expiry,
}

impl HandlerOptions {
    pub fn tag(mut self, tag: impl Into<Tag>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn expiry(mut self, expiry: Expiry) -> Self {
        self.expiry = expiry;
        self
    }
}

type Slots = Vec<Arc<Handler>>;

/// Per-client handler table: event type → handlers in registration order.
///
/// Clones share the table.
#[derive(Clone, Debug)]
pub struct HandlerRegistry {
    inner: Arc<RwLock<HashMap<EventType, Slots>>>,
    clock: Arc<dyn Clock>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

struct Pending {
    event_type: EventType,
    handler: Handler,
}

impl HandlerRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { inner: Arc::new(RwLock::new(HashMap::new())), clock }
    }

    /// Validate one registration without touching the table.
    fn prepare(
        &self,
        events: &EventSet,
        callback: &Callback,
        tag: &Tag,
        expiry: Expiry,
        now: u64,
    ) -> Result<Vec<Pending>, RegistrationError> {
        let mut pending = Vec::with_capacity(events.len());
        for event_type in events.iter() {
            if tag.is_default() {
                return Err(RegistrationError::ReservedTag { event_type, tag: tag.clone() });
            }
            if !callback.can_handle(event_type) {
                return Err(RegistrationError::SignatureMismatch {
                    event_type,
                    accepts: callback.accepts().to_string(),
                });
            }
            let state = HandlerState::from_expiry(expiry, now);
            if state == HandlerState::Expired {
                return Err(RegistrationError::AlreadyExpired { event_type, expiry });
            }
            pending.push(Pending {
                event_type,
                handler: Handler::new(tag.clone(), callback.clone(), state),
            });
        }
        Ok(pending)
    }

    fn commit(&self, pending: Vec<Pending>) {
        let mut map = self.inner.write().expect("handler registry poisoned");
        for Pending { event_type, handler } in pending {
            let slots = map.entry(event_type).or_default();
            let handler = Arc::new(handler);
            match slots.iter().position(|h| h.tag() == handler.tag()) {
                Some(idx) => {
                    debug!(target: "gatewire::handlers", event = %event_type, tag = %handler.tag(), "handler replaced");
                    slots[idx] = handler;
                }
                None => {
                    debug!(target: "gatewire::handlers", event = %event_type, tag = %handler.tag(), "handler added");
                    slots.push(handler);
                }
            }
        }
    }

    /// Register `callback` for every type in `events`, all sharing one tag and expiry.
    ///
    /// Fails without changing the table if the callback cannot receive one of the types or
    /// the expiry has already passed.
    pub fn add(
        &self,
        events: impl Into<EventSet>,
        callback: Callback,
        options: HandlerOptions,
    ) -> Result<Tag, RegistrationError> {
        let events = events.into();
        let tag = options.tag.unwrap_or_else(Tag::fresh);
        let pending = self.prepare(&events, &callback, &tag, options.expiry, self.clock.now_millis())?;
        self.commit(pending);
        Ok(tag)
    }

    /// Register every entry of `module`. A supplied tag and expiry apply to all of them;
    /// otherwise each entry gets its own fresh tag. All-or-nothing.
    pub fn add_module(
        &self,
        module: &HandlerModule,
        options: HandlerOptions,
    ) -> Result<Vec<Tag>, RegistrationError> {
        let now = self.clock.now_millis();
        let mut tags = Vec::with_capacity(module.len());
        let mut pending = Vec::new();
        for (events, callback) in module.iter() {
            let tag = options.tag.clone().unwrap_or_else(Tag::fresh);
            pending.extend(self.prepare(events, callback, &tag, options.expiry, now)?);
            tags.push(tag);
        }
        self.commit(pending);
        Ok(tags)
    }

    /// Install a built-in handler; its callback is typed for `event_type` and never expires.
    pub(crate) fn insert_default(&self, event_type: EventType, callback: Callback) {
        let handler = Handler::new(
            Tag::default_handler(),
            callback,
            HandlerState::from_expiry(Expiry::Never, 0),
        );
        self.commit(vec![Pending { event_type, handler }]);
    }

    /// Remove every handler for `event_type`.
    pub fn delete(&self, event_type: EventType) -> usize {
        let mut map = self.inner.write().expect("handler registry poisoned");
        map.remove(&event_type).map_or(0, |slots| slots.len())
    }

    /// Remove the handler registered under `tag` for `event_type`.
    pub fn delete_tag(&self, event_type: EventType, tag: &Tag) -> bool {
        let mut map = self.inner.write().expect("handler registry poisoned");
        let Some(slots) = map.get_mut(&event_type) else {
            return false;
        };
        let before = slots.len();
        slots.retain(|h| h.tag() != tag);
        let removed = slots.len() != before;
        if slots.is_empty() {
            map.remove(&event_type);
        }
        removed
    }

    /// Live handlers registered for exactly `event_type`, in registration order. Expired
    /// handlers found along the way are purged.
    pub fn handlers(&self, event_type: EventType) -> Vec<Arc<Handler>> {
        let now = self.clock.now_millis();
        {
            let map = self.inner.read().expect("handler registry poisoned");
            match map.get(&event_type) {
                None => return Vec::new(),
                Some(slots) if slots.iter().all(|h| !h.is_expired(now)) => return slots.clone(),
                Some(_) => {}
            }
        }
        let mut map = self.inner.write().expect("handler registry poisoned");
        let Some(slots) = map.get_mut(&event_type) else {
            return Vec::new();
        };
        slots.retain(|h| {
            let live = !h.is_expired(now);
            if !live {
                debug!(target: "gatewire::handlers", event = %event_type, tag = %h.tag(), "expired handler purged");
            }
            live
        });
        let live = slots.clone();
        if slots.is_empty() {
            map.remove(&event_type);
        }
        live
    }

    /// The dispatch list for an event of type `event_type`.
    ///
    /// Catch-all handlers come first, then the type's own handlers. Fallback handlers are
    /// appended only when there are no catch-alls and every specific handler is a built-in
    /// default one (or there are none).
    pub fn allhandlers(&self, event_type: EventType) -> Vec<Arc<Handler>> {
        let catchalls = if event_type == EventType::Any {
            Vec::new()
        } else {
            self.handlers(EventType::Any)
        };
        let mut specifics = self.handlers(event_type);

        let user_specific = specifics.iter().any(|h| !h.tag().is_default());
        if !catchalls.is_empty() || user_specific {
            let mut out = catchalls;
            out.append(&mut specifics);
            return out;
        }
        if event_type != EventType::Fallback {
            specifics.extend(self.handlers(EventType::Fallback));
        }
        specifics
    }

    /// Whether a live built-in default handler is registered for `event_type`.
    pub fn has_default(&self, event_type: EventType) -> bool {
        let now = self.clock.now_millis();
        let map = self.inner.read().expect("handler registry poisoned");
        map.get(&event_type)
            .is_some_and(|slots| slots.iter().any(|h| h.tag().is_default() && !h.is_expired(now)))
    }

    /// Total registered handlers, expired ones included until purged.
    pub fn len(&self) -> usize {
        let map = self.inner.read().expect("handler registry poisoned");
        map.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::MessageCreate;
    use std::time::Duration;

    fn registry() -> (HandlerRegistry, ManualClock) {
        let clock = ManualClock::new(1_000);
        (HandlerRegistry::new(Arc::new(clock.clone())), clock)
    }

    fn noop() -> Callback {
        Callback::any(|_, _| async {})
    }

    fn tags(list: &[Arc<Handler>]) -> Vec<String> {
        list.iter().map(|h| h.tag().to_string()).collect()
    }

    #[test]
    fn same_tag_replaces_fresh_tags_accumulate() {
        let (reg, _) = registry();
        let opts = HandlerOptions::default().tag("t");
        reg.add(EventType::Ready, noop(), opts.clone()).unwrap();
        reg.add(EventType::Ready, noop(), opts).unwrap();
        assert_eq!(reg.handlers(EventType::Ready).len(), 1);

        reg.add(EventType::Resumed, noop(), HandlerOptions::default()).unwrap();
        reg.add(EventType::Resumed, noop(), HandlerOptions::default()).unwrap();
        assert_eq!(reg.handlers(EventType::Resumed).len(), 2);
    }

    #[test]
    fn replacement_keeps_position() {
        let (reg, _) = registry();
        for t in ["a", "b", "c"] {
            reg.add(EventType::Ready, noop(), HandlerOptions::default().tag(t)).unwrap();
        }
        reg.add(EventType::Ready, noop(), HandlerOptions::default().tag("b")).unwrap();
        assert_eq!(tags(&reg.handlers(EventType::Ready)), ["a", "b", "c"]);
    }

    #[test]
    fn signature_mismatch_leaves_registry_unchanged() {
        let (reg, _) = registry();
        let typed = Callback::on::<MessageCreate, _, _>(|_, _| async {});
        let err = reg
            .add([EventType::MessageCreate, EventType::MessageUpdate], typed.clone(), HandlerOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::SignatureMismatch { event_type: EventType::MessageUpdate, .. }
        ));
        assert!(reg.is_empty());

        let err = reg.add(EventType::Any, typed, HandlerOptions::default()).unwrap_err();
        assert!(matches!(err, RegistrationError::SignatureMismatch { event_type: EventType::Any, .. }));
    }

    #[test]
    fn already_expired_is_rejected() {
        let (reg, _) = registry();
        let err = reg
            .add(EventType::Ready, noop(), HandlerOptions::default().expiry(Expiry::Until(1_000)))
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::AlreadyExpired { event_type: EventType::Ready, expiry: Expiry::Until(1_000) }
        );
        assert!(reg.add(EventType::Ready, noop(), HandlerOptions::default().expiry(Expiry::Count(-1))).is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn default_tag_is_reserved() {
        let (reg, _) = registry();
        reg.insert_default(EventType::Ready, noop());
        let err = reg
            .add(EventType::Ready, noop(), HandlerOptions::default().tag(Tag::default_handler()))
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::ReservedTag { event_type: EventType::Ready, tag: Tag::default_handler() }
        );
        let module = HandlerModule::new().with(EventType::Resumed, noop());
        assert!(reg.add_module(&module, HandlerOptions::default().tag(Tag::default_handler())).is_err());
        assert_eq!(reg.handlers(EventType::Ready).len(), 1);
        assert!(reg.handlers(EventType::Resumed).is_empty());
    }

    #[test]
    fn union_registers_one_handler_per_member_with_shared_tag() {
        let (reg, _) = registry();
        let tag = reg.add(EventSet::reactions(), noop(), HandlerOptions::default()).unwrap();
        for t in EventSet::reactions().iter() {
            assert_eq!(tags(&reg.handlers(t)), [tag.to_string()]);
        }
        assert_eq!(reg.len(), 3);
        assert!(reg.delete_tag(EventType::MessageReactionAdd, &tag));
        assert!(!reg.delete_tag(EventType::MessageReactionAdd, &tag));
        assert_eq!(reg.delete(EventType::MessageReactionRemove), 1);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn expired_handlers_are_purged_on_lookup() {
        let (reg, clock) = registry();
        reg.add(EventType::Ready, noop(), HandlerOptions::default().expiry(Expiry::after(Duration::from_secs(1))))
            .unwrap();
        reg.add(EventType::Ready, noop(), HandlerOptions::default()).unwrap();
        assert_eq!(reg.len(), 2);
        clock.advance(Duration::from_secs(1));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.handlers(EventType::Ready).len(), 1);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn allhandlers_ordering() {
        let (reg, _) = registry();
        let default = HandlerOptions::default().tag(Tag::default_handler());

        // catch-all + specific
        reg.add(EventType::Any, noop(), HandlerOptions::default().tag("catchall")).unwrap();
        reg.add(EventType::Ready, noop(), HandlerOptions::default().tag("specific")).unwrap();
        reg.add(EventType::Fallback, noop(), HandlerOptions::default().tag("fallback")).unwrap();
        assert_eq!(tags(&reg.allhandlers(EventType::Ready)), ["catchall", "specific"]);

        // default specific + fallback
        reg.delete(EventType::Any);
        reg.delete(EventType::Ready);
        reg.add(EventType::Ready, noop(), default.clone()).unwrap();
        assert_eq!(
            tags(&reg.allhandlers(EventType::Ready)),
            [Tag::default_handler().to_string(), "fallback".to_string()]
        );
        assert!(reg.has_default(EventType::Ready));

        // non-default specific + fallback
        reg.add(EventType::Ready, noop(), HandlerOptions::default().tag("user")).unwrap();
        assert_eq!(
            tags(&reg.allhandlers(EventType::Ready)),
            [Tag::default_handler().to_string(), "user".to_string()]
        );

        // no specifics at all
        assert_eq!(tags(&reg.allhandlers(EventType::Resumed)), ["fallback"]);
        // a catch-all suppresses fallbacks even with only default specifics
        reg.add(EventType::Any, noop(), HandlerOptions::default().tag("catchall")).unwrap();
        assert_eq!(tags(&reg.allhandlers(EventType::Resumed)), ["catchall"]);
        // the markers themselves
        assert_eq!(tags(&reg.allhandlers(EventType::Any)), ["catchall"]);
        assert_eq!(tags(&reg.allhandlers(EventType::Fallback)), ["catchall", "fallback"]);
    }
}
