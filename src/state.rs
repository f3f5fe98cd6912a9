//! Local entity cache.
//!
//! [`Collection`] is the keyed upsert store; [`upsert_seq`] and [`upsert_seq_entity`] are
//! the sequence form used for lists embedded in entities. [`State`] groups one collection
//! per entity kind and is fed by both REST responses and the default event handlers.

mod collection;
mod sequence;

pub use collection::Collection;
pub use sequence::{remove_seq, upsert_seq, upsert_seq_entity};

use crate::clock::Clock;
use crate::config::{CacheTtls, DynamicConfig};
use crate::entities::{Channel, Field, Guild, Member, Merge, Message, Presence, Role, Snowflake, User};
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Entity kinds with their own cache lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Guild,
    Channel,
    Member,
    Role,
    Message,
    Presence,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::User => "user",
            EntityKind::Guild => "guild",
            EntityKind::Channel => "channel",
            EntityKind::Member => "member",
            EntityKind::Role => "role",
            EntityKind::Message => "message",
            EntityKind::Presence => "presence",
        };
        f.write_str(name)
    }
}

/// Members and roles are scoped to a guild.
pub type GuildScoped = (Snowflake, Snowflake);

/// Presences are keyed by guild (absent for direct contexts) and user.
pub type PresenceKey = (Option<Snowflake>, Snowflake);

/// The per-client cache. Clones share storage.
#[derive(Clone, Debug)]
pub struct State {
    pub users: Collection<Snowflake, User>,
    pub guilds: Collection<Snowflake, Guild>,
    pub channels: Collection<Snowflake, Channel>,
    pub messages: Collection<Snowflake, Message>,
    pub members: Collection<GuildScoped, Member>,
    pub roles: Collection<GuildScoped, Role>,
    pub presences: Collection<PresenceKey, Presence>,
    current_user: Arc<RwLock<Option<User>>>,
    ttls: DynamicConfig<CacheTtls>,
}

impl State {
    pub fn new(ttls: DynamicConfig<CacheTtls>, clock: Arc<dyn Clock>) -> Self {
        Self {
            users: Collection::new(EntityKind::User, ttls.clone(), clock.clone()),
            guilds: Collection::new(EntityKind::Guild, ttls.clone(), clock.clone()),
            channels: Collection::new(EntityKind::Channel, ttls.clone(), clock.clone()),
            messages: Collection::new(EntityKind::Message, ttls.clone(), clock.clone()),
            members: Collection::new(EntityKind::Member, ttls.clone(), clock.clone()),
            roles: Collection::new(EntityKind::Role, ttls.clone(), clock.clone()),
            presences: Collection::new(EntityKind::Presence, ttls.clone(), clock),
            current_user: Arc::new(RwLock::new(None)),
            ttls,
        }
    }

    /// Live TTL settings shared by every collection.
    pub fn ttls(&self) -> &DynamicConfig<CacheTtls> {
        &self.ttls
    }

    /// The account this client is logged in as, once known.
    pub fn current_user(&self) -> Option<User> {
        self.current_user.read().expect("current user poisoned").clone()
    }

    /// Merge into the current user and mirror it into `users`.
    pub fn set_current_user(&self, user: User) -> User {
        let merged = {
            let mut guard = self.current_user.write().expect("current user poisoned");
            let merged = match guard.take() {
                Some(existing) if existing.id == user.id => existing.merge(user),
                _ => user,
            };
            *guard = Some(merged.clone());
            merged
        };
        self.users.upsert(merged.id, merged.clone());
        merged
    }

    /// Upsert a guild and spread its embedded collections into the flat ones.
    pub fn put_guild(&self, guild: Guild) -> Guild {
        let guild_id = guild.id;
        if let Some(channels) = guild.channels.as_option() {
            for channel in channels {
                let mut channel = channel.clone();
                if channel.guild_id.is_missing() {
                    channel.guild_id = Field::Present(guild_id);
                }
                self.channels.upsert(channel.id, channel);
            }
        }
        if let Some(roles) = guild.roles.as_option() {
            for role in roles {
                self.roles.upsert((guild_id, role.id), role.clone());
            }
        }
        if let Some(members) = guild.members.as_option() {
            for member in members {
                self.cache_member(guild_id, member.clone());
            }
        }
        if let Some(presences) = guild.presences.as_option() {
            for presence in presences {
                self.cache_presence(Some(guild_id), presence.clone());
            }
        }
        self.guilds.upsert(guild_id, guild)
    }

    /// Forget a guild and everything scoped to it.
    pub fn remove_guild(&self, guild_id: Snowflake) -> Option<Guild> {
        let channels = self
            .channels
            .remove_where(|_, c| c.guild_id.as_option() == Some(&guild_id));
        let members = self.members.remove_where(|(g, _), _| *g == guild_id);
        self.roles.remove_where(|(g, _), _| *g == guild_id);
        self.presences.remove_where(|(g, _), _| *g == Some(guild_id));
        debug!(target: "gatewire::state", guild = %guild_id, channels, members, "guild removed");
        self.guilds.remove(&guild_id)
    }

    /// Upsert a member and its user, keeping the guild's member list in sync. `None` if the
    /// payload has no user.
    pub fn put_member(&self, guild_id: Snowflake, member: Member) -> Option<Member> {
        let stored = self.cache_member(guild_id, member)?;
        self.guilds.modify(&guild_id, |g| {
            if let Some(list) = g.members.as_mut_option() {
                upsert_seq_entity(list, stored.clone());
            }
        });
        Some(stored)
    }

    pub fn remove_member(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Member> {
        self.guilds.modify(&guild_id, |g| {
            if let Some(list) = g.members.as_mut_option() {
                remove_seq(list, &user_id);
            }
        });
        self.members.remove(&(guild_id, user_id))
    }

    /// Upsert a presence, keeping the guild's presence list in sync. `None` if the payload
    /// has no user.
    pub fn put_presence(&self, guild_id: Option<Snowflake>, presence: Presence) -> Option<Presence> {
        let stored = self.cache_presence(guild_id, presence)?;
        if let Some(guild_id) = guild_id {
            self.guilds.modify(&guild_id, |g| {
                if let Some(list) = g.presences.as_mut_option() {
                    upsert_seq_entity(list, stored.clone());
                }
            });
        }
        Some(stored)
    }

    pub fn remove_presence(&self, guild_id: Option<Snowflake>, user_id: Snowflake) -> Option<Presence> {
        if let Some(guild_id) = guild_id {
            self.guilds.modify(&guild_id, |g| {
                if let Some(list) = g.presences.as_mut_option() {
                    remove_seq(list, &user_id);
                }
            });
        }
        self.presences.remove(&(guild_id, user_id))
    }

    fn cache_member(&self, guild_id: Snowflake, member: Member) -> Option<Member> {
        let user = member.user.as_option()?.clone();
        let user_id = user.id;
        self.users.upsert(user_id, user);
        Some(self.members.upsert((guild_id, user_id), member))
    }

    fn cache_presence(&self, guild_id: Option<Snowflake>, presence: Presence) -> Option<Presence> {
        let user_id = presence.user.as_option()?.id;
        Some(self.presences.upsert((guild_id, user_id), presence))
    }

    /// Upsert a channel and keep its guild's channel list in sync.
    pub fn put_channel(&self, channel: Channel) -> Channel {
        let stored = self.channels.upsert(channel.id, channel);
        if let Some(guild_id) = stored.guild_id.as_option() {
            self.guilds.modify(guild_id, |g| {
                if let Some(list) = g.channels.as_mut_option() {
                    upsert_seq_entity(list, stored.clone());
                }
            });
        }
        stored
    }

    pub fn remove_channel(&self, channel_id: Snowflake) -> Option<Channel> {
        let removed = self.channels.remove(&channel_id);
        if let Some(guild_id) = removed.as_ref().and_then(|c| c.guild_id.as_option()) {
            self.guilds.modify(guild_id, |g| {
                if let Some(list) = g.channels.as_mut_option() {
                    remove_seq(list, &channel_id);
                }
            });
        }
        removed
    }

    /// Upsert a role and keep its guild's role list in sync.
    pub fn put_role(&self, guild_id: Snowflake, role: Role) -> Role {
        let stored = self.roles.upsert((guild_id, role.id), role);
        self.guilds.modify(&guild_id, |g| {
            if let Some(list) = g.roles.as_mut_option() {
                upsert_seq_entity(list, stored.clone());
            }
        });
        stored
    }

    pub fn remove_role(&self, guild_id: Snowflake, role_id: Snowflake) -> Option<Role> {
        self.guilds.modify(&guild_id, |g| {
            if let Some(list) = g.roles.as_mut_option() {
                remove_seq(list, &role_id);
            }
        });
        self.roles.remove(&(guild_id, role_id))
    }

    /// Upsert a message and its author.
    pub fn put_message(&self, message: Message) -> Message {
        if let Some(author) = message.author.as_option() {
            self.users.upsert(author.id, author.clone());
        }
        self.messages.upsert(message.id, message)
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.users.clear();
        self.guilds.clear();
        self.channels.clear();
        self.messages.clear();
        self.members.clear();
        self.roles.clear();
        self.presences.clear();
        *self.current_user.write().expect("current user poisoned") = None;
    }
}
