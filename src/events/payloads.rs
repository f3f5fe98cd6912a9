//! Typed payloads of gateway events.

use crate::entities::{Channel, Emoji, Field, Guild, Member, Message, Presence, Role, Snowflake, User};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Sent once the session is established.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ready {
    #[serde(rename = "v", default)]
    pub version: u32,
    pub user: User,
    /// Unavailable guild stubs; full guilds follow as `GUILD_CREATE`.
    #[serde(default)]
    pub guilds: Vec<Guild>,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Resumed {}

macro_rules! wraps {
    ($($(#[$meta:meta])* $name:ident($field:ident: $inner:ty);)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name {
                pub $field: $inner,
            }
        )*
    };
}

wraps! {
    ChannelCreate(channel: Channel);
    ChannelUpdate(channel: Channel);
    ChannelDelete(channel: Channel);
    GuildCreate(guild: Guild);
    GuildUpdate(guild: Guild);
    MessageCreate(message: Message);
    /// Usually partial: only `id`, `channel_id` and the changed fields are guaranteed.
    MessageUpdate(message: Message);
    PresenceUpdate(presence: Presence);
    UserUpdate(user: User);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPinsUpdate {
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub last_pin_timestamp: Field<String>,
}

/// The guild left, was deleted, or became unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildDelete {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildBanAdd {
    pub guild_id: Snowflake,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildBanRemove {
    pub guild_id: Snowflake,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildEmojisUpdate {
    pub guild_id: Snowflake,
    pub emojis: Vec<Emoji>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildMemberAdd {
    pub guild_id: Snowflake,
    #[serde(flatten)]
    pub member: Member,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildMemberUpdate {
    pub guild_id: Snowflake,
    #[serde(flatten)]
    pub member: Member,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildMemberRemove {
    pub guild_id: Snowflake,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildRoleCreate {
    pub guild_id: Snowflake,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildRoleUpdate {
    pub guild_id: Snowflake,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildRoleDelete {
    pub guild_id: Snowflake,
    pub role_id: Snowflake,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDelete {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDeleteBulk {
    pub ids: Vec<Snowflake>,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReactionAdd {
    pub user_id: Snowflake,
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub emoji: Emoji,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReactionRemove {
    pub user_id: Snowflake,
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub emoji: Emoji,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReactionRemoveAll {
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingStart {
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub user_id: Snowflake,
    pub timestamp: u64,
}

/// An event whose type is not modelled or whose payload failed to parse.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownEvent {
    /// Raw event name.
    pub t: String,
    /// Raw payload.
    pub d: JsonValue,
    /// Sequence number, if the gateway sent one.
    pub s: Option<u64>,
}
