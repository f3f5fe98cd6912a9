//! Convenient re-exports for common gatewire types.
pub use crate::{
    client::{Cacheable, Client},
    config::{CacheTtls, ClientConfig},
    entities::{Channel, Field, Guild, Member, Merge, Message, Presence, Role, Snowflake, User},
    events::{Event, EventSet, EventType, GatewayEvent, MessageCreate, MessageUpdate, Ready},
    handlers::{Callback, Expiry, HandlerModule, HandlerOptions, Tag},
    rest::Response,
};
