use crate::client::Client;
use crate::events::{Event, EventSet, GatewayEvent};
use crate::handlers::Callback;
use std::future::Future;

/// A bundle of handlers registered together with
/// [`HandlerRegistry::add_module`](crate::handlers::HandlerRegistry::add_module).
///
/// ```
/// use gatewire::events::{EventType, MessageCreate, Ready};
/// use gatewire::handlers::HandlerModule;
///
/// let module = HandlerModule::new()
///     .on::<Ready, _, _>(|_client, ready| async move { println!("session {}", ready.session_id) })
///     .on::<MessageCreate, _, _>(|_client, _msg| async {})
///     .for_events([EventType::GuildBanAdd, EventType::GuildBanRemove], |_client, _event| async {});
/// assert_eq!(module.len(), 3);
/// ```
#[derive(Clone, Debug, Default)]
pub struct HandlerModule {
    entries: Vec<(EventSet, Callback)>,
}

impl HandlerModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<T, F, Fut>(self, f: F) -> Self
    where
        T: GatewayEvent,
        F: Fn(Client, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.with(T::TYPE, Callback::on::<T, _, _>(f))
    }

    pub fn for_events<F, Fut>(self, set: impl Into<EventSet>, f: F) -> Self
    where
        F: Fn(Client, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let set = set.into();
        self.with(set.clone(), Callback::for_events(set, f))
    }

    /// Add an arbitrary pairing. Mismatches surface when the module is registered.
    pub fn with(mut self, events: impl Into<EventSet>, callback: Callback) -> Self {
        self.entries.push((events.into(), callback));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EventSet, &Callback)> {
        self.entries.iter().map(|(events, callback)| (events, callback))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventType, MessageCreate};
    use crate::handlers::{HandlerOptions, HandlerRegistry, Tag};

    #[test]
    fn module_registration_is_all_or_nothing() {
        let reg = HandlerRegistry::default();
        let module = HandlerModule::new()
            .on::<MessageCreate, _, _>(|_, _| async {})
            .with(EventType::Any, Callback::on::<MessageCreate, _, _>(|_, _| async {}));
        assert!(reg.add_module(&module, HandlerOptions::default()).is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn shared_tag_applies_to_every_entry() {
        let reg = HandlerRegistry::default();
        let module = HandlerModule::new()
            .on::<MessageCreate, _, _>(|_, _| async {})
            .for_events(EventSet::reactions(), |_, _| async {});
        let tags = reg.add_module(&module, HandlerOptions::default().tag("bundle")).unwrap();
        assert_eq!(tags, vec![Tag::from("bundle"), Tag::from("bundle")]);
        assert_eq!(reg.len(), 4);
        assert!(reg.delete_tag(EventType::MessageReactionAdd, &Tag::from("bundle")));

        let fresh = reg.add_module(&module, HandlerOptions::default()).unwrap();
        assert_ne!(fresh[0], fresh[1]);
        assert_eq!(reg.len(), 7);
    }
}
