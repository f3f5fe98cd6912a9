//! Gateway event model.
//!
//! Events are a closed set: [`EventType`] names every concrete type plus two markers,
//! [`EventType::Any`] (catch-all: handlers registered there see every event) and
//! [`EventType::Fallback`] (handlers that only run when nothing more specific applies).
//! Neither marker is ever the type of an actual [`Event`].
//!
//! A union of event types is an [`EventSet`]; registering a handler for a set registers it
//! once per member.

pub mod payloads;

pub use payloads::*;

use crate::error::ParseError;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::fmt;

/// Implemented by every typed payload, enabling typed callbacks.
pub trait GatewayEvent: Clone + Send + Sync + 'static {
    const TYPE: EventType;

    fn from_event(event: &Event) -> Option<&Self>;

    fn into_event(self) -> Event;
}

macro_rules! gateway_events {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Type tag of an event, plus the catch-all and fallback markers.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum EventType {
            /// Catch-all marker.
            Any,
            /// Fallback marker.
            Fallback,
            $( $variant, )*
            /// Unmodelled or unparseable events.
            Unknown,
        }

        impl EventType {
            /// Every concrete (dispatchable) type.
            pub const CONCRETE: &'static [EventType] = &[$(EventType::$variant,)* EventType::Unknown];

            /// Wire name, e.g. `MESSAGE_CREATE`.
            pub fn name(&self) -> &'static str {
                match self {
                    EventType::Any => "ANY",
                    EventType::Fallback => "FALLBACK",
                    $( EventType::$variant => $name, )*
                    EventType::Unknown => "UNKNOWN",
                }
            }

            /// Concrete type for a wire name.
            pub fn from_name(name: &str) -> Option<EventType> {
                match name {
                    $( $name => Some(EventType::$variant), )*
                    _ => None,
                }
            }
        }

        /// A decoded gateway event.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Event {
            $( $variant($variant), )*
            Unknown(UnknownEvent),
        }

        impl Event {
            pub fn event_type(&self) -> EventType {
                match self {
                    $( Event::$variant(_) => EventType::$variant, )*
                    Event::Unknown(_) => EventType::Unknown,
                }
            }

            /// `None` for unmodelled names.
            fn parse_named(t: &str, d: &JsonValue) -> Option<Result<Event, serde_json::Error>> {
                match t {
                    $( $name => Some($variant::deserialize(d).map(Event::$variant)), )*
                    _ => None,
                }
            }
        }

        $(
            impl GatewayEvent for $variant {
                const TYPE: EventType = EventType::$variant;

                fn from_event(event: &Event) -> Option<&Self> {
                    match event {
                        Event::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }

                fn into_event(self) -> Event {
                    Event::$variant(self)
                }
            }
        )*
    };
}

gateway_events! {
    Ready => "READY",
    Resumed => "RESUMED",
    ChannelCreate => "CHANNEL_CREATE",
    ChannelUpdate => "CHANNEL_UPDATE",
    ChannelDelete => "CHANNEL_DELETE",
    ChannelPinsUpdate => "CHANNEL_PINS_UPDATE",
    GuildCreate => "GUILD_CREATE",
    GuildUpdate => "GUILD_UPDATE",
    GuildDelete => "GUILD_DELETE",
    GuildBanAdd => "GUILD_BAN_ADD",
    GuildBanRemove => "GUILD_BAN_REMOVE",
    GuildEmojisUpdate => "GUILD_EMOJIS_UPDATE",
    GuildMemberAdd => "GUILD_MEMBER_ADD",
    GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
    GuildMemberRemove => "GUILD_MEMBER_REMOVE",
    GuildRoleCreate => "GUILD_ROLE_CREATE",
    GuildRoleUpdate => "GUILD_ROLE_UPDATE",
    GuildRoleDelete => "GUILD_ROLE_DELETE",
    MessageCreate => "MESSAGE_CREATE",
    MessageUpdate => "MESSAGE_UPDATE",
    MessageDelete => "MESSAGE_DELETE",
    MessageDeleteBulk => "MESSAGE_DELETE_BULK",
    MessageReactionAdd => "MESSAGE_REACTION_ADD",
    MessageReactionRemove => "MESSAGE_REACTION_REMOVE",
    MessageReactionRemoveAll => "MESSAGE_REACTION_REMOVE_ALL",
    PresenceUpdate => "PRESENCE_UPDATE",
    TypingStart => "TYPING_START",
    UserUpdate => "USER_UPDATE",
}

impl GatewayEvent for UnknownEvent {
    const TYPE: EventType = EventType::Unknown;

    fn from_event(event: &Event) -> Option<&Self> {
        match event {
            Event::Unknown(inner) => Some(inner),
            _ => None,
        }
    }

    fn into_event(self) -> Event {
        Event::Unknown(self)
    }
}

impl EventType {
    /// True for the catch-all and fallback markers.
    pub fn is_marker(&self) -> bool {
        matches!(self, EventType::Any | EventType::Fallback)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Event {
    /// Decode a raw gateway dispatch.
    ///
    /// Unmodelled event names become [`Event::Unknown`]. A modelled name whose payload does
    /// not parse yields the error; callers that must not drop events use [`Event::decode`].
    pub fn try_decode(t: &str, d: JsonValue, s: Option<u64>) -> Result<Event, ParseError> {
        match Event::parse_named(t, &d) {
            Some(parsed) => parsed.map_err(|source| ParseError { event: t.to_string(), source }),
            None => Ok(Event::Unknown(UnknownEvent { t: t.to_string(), d, s })),
        }
    }

    /// Decode a raw gateway dispatch, never failing: unparseable payloads come back as
    /// [`Event::Unknown`] along with the parse error.
    pub fn decode(t: &str, d: JsonValue, s: Option<u64>) -> (Event, Option<ParseError>) {
        match Event::parse_named(t, &d) {
            Some(Ok(event)) => (event, None),
            Some(Err(source)) => {
                let err = ParseError { event: t.to_string(), source };
                (Event::Unknown(UnknownEvent { t: t.to_string(), d, s }), Some(err))
            }
            None => (Event::Unknown(UnknownEvent { t: t.to_string(), d, s }), None),
        }
    }

    /// Typed view of the payload.
    pub fn payload<T: GatewayEvent>(&self) -> Option<&T> {
        T::from_event(self)
    }
}

/// A union of concrete event types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSet(Vec<EventType>);

impl EventSet {
    /// Build a set, dropping duplicates while keeping first-seen order.
    pub fn of(types: impl IntoIterator<Item = EventType>) -> Self {
        let mut out: Vec<EventType> = Vec::new();
        for t in types {
            if !out.contains(&t) {
                out.push(t);
            }
        }
        EventSet(out)
    }

    pub fn contains(&self, event_type: EventType) -> bool {
        self.0.contains(&event_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = EventType> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn channels() -> Self {
        Self::of([
            EventType::ChannelCreate,
            EventType::ChannelUpdate,
            EventType::ChannelDelete,
            EventType::ChannelPinsUpdate,
        ])
    }

    pub fn guild_members() -> Self {
        Self::of([
            EventType::GuildMemberAdd,
            EventType::GuildMemberUpdate,
            EventType::GuildMemberRemove,
        ])
    }

    pub fn roles() -> Self {
        Self::of([EventType::GuildRoleCreate, EventType::GuildRoleUpdate, EventType::GuildRoleDelete])
    }

    pub fn messages() -> Self {
        Self::of([
            EventType::MessageCreate,
            EventType::MessageUpdate,
            EventType::MessageDelete,
            EventType::MessageDeleteBulk,
        ])
    }

    pub fn reactions() -> Self {
        Self::of([
            EventType::MessageReactionAdd,
            EventType::MessageReactionRemove,
            EventType::MessageReactionRemoveAll,
        ])
    }
}

impl From<EventType> for EventSet {
    fn from(t: EventType) -> Self {
        EventSet(vec![t])
    }
}

impl<const N: usize> From<[EventType; N]> for EventSet {
    fn from(types: [EventType; N]) -> Self {
        EventSet::of(types)
    }
}

impl fmt::Display for EventSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(EventType::name).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Snowflake;
    use serde_json::json;

    #[test]
    fn names_round_trip() {
        for t in EventType::CONCRETE.iter().filter(|t| **t != EventType::Unknown) {
            assert_eq!(EventType::from_name(t.name()), Some(*t));
        }
        assert_eq!(EventType::from_name("ANY"), None);
        assert_eq!(EventType::from_name("UNKNOWN"), None);
    }

    #[test]
    fn decode_known_event() {
        let (event, err) = Event::decode(
            "MESSAGE_DELETE",
            json!({"id": "1", "channel_id": "2"}),
            Some(3),
        );
        assert!(err.is_none());
        assert_eq!(event.event_type(), EventType::MessageDelete);
        let payload: &MessageDelete = event.payload().unwrap();
        assert_eq!(payload.channel_id, Snowflake(2));
        assert_eq!(payload.guild_id, None);
    }

    #[test]
    fn unmodelled_name_is_unknown_without_error() {
        let (event, err) = Event::decode("VOICE_SERVER_UPDATE", json!({"token": "x"}), Some(9));
        assert!(err.is_none());
        match event {
            Event::Unknown(u) => {
                assert_eq!(u.t, "VOICE_SERVER_UPDATE");
                assert_eq!(u.s, Some(9));
            }
            other => panic!("expected unknown, got {other:?}"),
        }
    }

    #[test]
    fn bad_payload_surfaces_as_unknown_with_error() {
        let d = json!({"id": "not-a-number", "channel_id": "2"});
        let (event, err) = Event::decode("MESSAGE_DELETE", d.clone(), None);
        assert_eq!(event, Event::Unknown(UnknownEvent { t: "MESSAGE_DELETE".into(), d, s: None }));
        assert_eq!(err.unwrap().event, "MESSAGE_DELETE");

        assert!(Event::try_decode("MESSAGE_DELETE", json!({}), None).is_err());
    }

    #[test]
    fn member_add_flattens_member_fields() {
        let (event, err) = Event::decode(
            "GUILD_MEMBER_ADD",
            json!({"guild_id": "1", "user": {"id": "2"}, "roles": ["3"], "nick": null}),
            None,
        );
        assert!(err.is_none());
        let add: &GuildMemberAdd = event.payload().unwrap();
        assert_eq!(add.guild_id, Snowflake(1));
        assert_eq!(add.member.roles.as_option(), Some(&vec![Snowflake(3)]));
        assert!(matches!(add.member.nick, crate::entities::Field::Null));
        assert!(add.member.deaf.is_missing());
    }

    #[test]
    fn event_set_dedups_and_displays() {
        let set = EventSet::of([EventType::MessageCreate, EventType::MessageCreate, EventType::Ready]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.to_string(), "{MESSAGE_CREATE, READY}");
        assert!(EventSet::reactions().contains(EventType::MessageReactionAdd));
    }
}
