//! Cacheable domain entities and field-level merging.
//!
//! Partial updates are the norm: a `MESSAGE_UPDATE` may carry only `id`, `channel_id` and
//! `content`. Every non-identity field is therefore a [`Field`], which tells an *absent* field
//! apart from an explicit `null`, and [`Merge`] combines an older and a newer value so that
//! absent fields never erase what was already known.
//!
//! Only the slice of the remote schema needed by the cache is modelled here.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;
use std::hash::Hash;

/// Remote identifier. Serialized as a decimal string; parsed from a string or a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Snowflake(pub u64);

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Snowflake {
    fn from(id: u64) -> Self {
        Snowflake(id)
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnowflakeVisitor;

        impl<'de> Visitor<'de> for SnowflakeVisitor {
            type Value = Snowflake;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a snowflake as a decimal string or integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Snowflake, E> {
                Ok(Snowflake(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Snowflake, E> {
                u64::try_from(v).map(Snowflake).map_err(|_| E::custom("negative snowflake"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Snowflake, E> {
                v.parse().map(Snowflake).map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(SnowflakeVisitor)
    }
}

/// A field that may be absent, explicitly null, or present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    /// Not part of the payload. Merging keeps the older value.
    Missing,
    /// Explicitly `null`. Counts as present: it overrides older values.
    Null,
    Present(T),
}

impl<T> Field<T> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Field::Missing)
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Field::Present(_))
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Field::Present(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_mut_option(&mut self) -> Option<&mut T> {
        match self {
            Field::Present(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Field::Present(v) => Some(v),
            _ => None,
        }
    }

    /// `self` unless it is missing, in which case `older`.
    pub fn or(self, older: Field<T>) -> Field<T> {
        match self {
            Field::Missing => older,
            newer => newer,
        }
    }
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Missing
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Present(value)
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Field::Null, Field::Present)
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Present(v) => serializer.serialize_some(v),
            Field::Missing | Field::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(|v| v.map_or(Field::Null, Field::Present))
    }
}

/// Combine an older value with a newer one: the newer value's present fields win, its
/// absent fields are taken from the older value.
pub trait Merge: Sized {
    fn merge(self, newer: Self) -> Self;
}

impl<T> Merge for Field<T> {
    fn merge(self, newer: Self) -> Self {
        newer.or(self)
    }
}

/// A cacheable value with an identity.
pub trait Entity: Merge + Clone + Send + Sync + 'static {
    type Key: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static;

    /// Identity of this value, if the payload carried it.
    fn key(&self) -> Option<Self::Key>;
}

/// Declares an entity struct whose identity fields are plain and every other field is a
/// [`Field`], and derives its [`Merge`] implementation.
macro_rules! entity {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            key { $( $(#[$kmeta:meta])* pub $kfield:ident: $kty:ty ),* $(,)? }
            $( $(#[$fmeta:meta])* pub $field:ident: $fty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
        pub struct $name {
            $( $(#[$kmeta])* pub $kfield: $kty, )*
            $(
                $(#[$fmeta])*
                #[serde(default, skip_serializing_if = "Field::is_missing")]
                pub $field: Field<$fty>,
            )*
        }

        impl Merge for $name {
            #[allow(unused_variables)]
            fn merge(self, newer: Self) -> Self {
                Self {
                    $( $kfield: newer.$kfield, )*
                    $( $field: newer.$field.or(self.$field), )*
                }
            }
        }
    };
}

entity! {
    /// A user account.
    pub struct User {
        key { pub id: Snowflake }
        pub username: String,
        pub discriminator: String,
        pub global_name: String,
        pub avatar: String,
        pub bot: bool,
    }
}

entity! {
    /// A guild role.
    pub struct Role {
        key { pub id: Snowflake }
        pub name: String,
        pub color: u32,
        pub hoist: bool,
        pub position: i64,
        pub permissions: String,
        pub managed: bool,
        pub mentionable: bool,
    }
}

entity! {
    /// A guild or direct-message channel.
    pub struct Channel {
        key { pub id: Snowflake }
        #[serde(rename = "type")]
        pub kind: u8,
        pub guild_id: Snowflake,
        pub name: String,
        pub topic: String,
        pub position: i64,
        pub nsfw: bool,
        pub last_message_id: Snowflake,
        pub parent_id: Snowflake,
    }
}

entity! {
    /// A guild's view of a user. Keyed by the embedded user's id.
    pub struct Member {
        key {}
        pub user: User,
        pub nick: String,
        pub roles: Vec<Snowflake>,
        pub joined_at: String,
        pub deaf: bool,
        pub mute: bool,
    }
}

entity! {
    /// A user's status within a guild. Keyed by the embedded (partial) user's id.
    pub struct Presence {
        key {}
        pub user: User,
        pub guild_id: Snowflake,
        pub status: String,
        pub activities: Vec<JsonValue>,
    }
}

entity! {
    /// A message. `channel_id` is part of every message payload, partial or not.
    pub struct Message {
        key { pub id: Snowflake, pub channel_id: Snowflake }
        pub guild_id: Snowflake,
        pub author: User,
        pub content: String,
        pub timestamp: String,
        pub edited_timestamp: String,
        pub tts: bool,
        pub mention_everyone: bool,
        pub mentions: Vec<User>,
        pub pinned: bool,
        pub embeds: Vec<JsonValue>,
    }
}

entity! {
    /// A guild. Collections arrive complete on `GUILD_CREATE` and are kept in sync by the
    /// default handlers afterwards.
    pub struct Guild {
        key { pub id: Snowflake }
        pub name: String,
        pub icon: String,
        pub owner_id: Snowflake,
        pub unavailable: bool,
        pub member_count: u64,
        pub roles: Vec<Role>,
        pub emojis: Vec<Emoji>,
        pub channels: Vec<Channel>,
        pub members: Vec<Member>,
        pub presences: Vec<Presence>,
    }
}

/// A custom or unicode emoji. Unicode emojis have no id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Emoji {
    #[serde(default)]
    pub id: Option<Snowflake>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub animated: Field<bool>,
}

impl Entity for User {
    type Key = Snowflake;
    fn key(&self) -> Option<Snowflake> {
        Some(self.id)
    }
}

impl Entity for Role {
    type Key = Snowflake;
    fn key(&self) -> Option<Snowflake> {
        Some(self.id)
    }
}

impl Entity for Channel {
    type Key = Snowflake;
    fn key(&self) -> Option<Snowflake> {
        Some(self.id)
    }
}

impl Entity for Guild {
    type Key = Snowflake;
    fn key(&self) -> Option<Snowflake> {
        Some(self.id)
    }
}

impl Entity for Message {
    type Key = Snowflake;
    fn key(&self) -> Option<Snowflake> {
        Some(self.id)
    }
}

impl Entity for Member {
    type Key = Snowflake;
    fn key(&self) -> Option<Snowflake> {
        self.user.as_option().map(|u| u.id)
    }
}

impl Entity for Presence {
    type Key = Snowflake;
    fn key(&self) -> Option<Snowflake> {
        self.user.as_option().map(|u| u.id)
    }
}
