//! Event handler registry and dispatch ordering.
//!
//! Handlers are registered per concrete [`EventType`](crate::events::EventType) under a
//! [`Tag`]. For each incoming event the registry computes the dispatch list with
//! [`HandlerRegistry::allhandlers`]:
//!
//! 1. catch-all handlers (registered on `EventType::Any`), first;
//! 2. the event type's own handlers, in registration order;
//! 3. fallback handlers (registered on `EventType::Fallback`), only when there are no
//!    catch-alls and every specific handler is a built-in default one.
//!
//! Expiry is lazy: an expired handler is skipped at dispatch and purged on the next lookup.

mod callback;
pub(crate) mod defaults;
mod module;
mod registry;

pub use callback::{Accepts, Callback, Expiry, Handler, HandlerFuture, HandlerState, Remaining, Tag};
pub use defaults::DEFAULT_EVENT_TYPES;
pub use module::HandlerModule;
pub use registry::{HandlerOptions, HandlerRegistry};
